//! Optional native acceleration with a lazily failing fallback.
//!
//! The application asks for a capability by name and always gets a provider
//! back. If the native extension is installed, that is the real thing. If it
//! is not, the provider is a stand-in whose every operation fails with
//! `CompatError::Unavailable`, so callers switch to their own fallback at the
//! point of use instead of at startup. A present-but-broken extension is a
//! hard error from `resolve`.
//!
//! ```no_run
//! let mesh = accel_compat::cumesh()?;
//! match mesh.call("remesh", &[0.0, 1.0, 2.0]) {
//!     Ok(out) => println!("accelerated: {out:?}"),
//!     Err(e) if e.is_unavailable() => println!("falling back: {e}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok::<(), accel_compat::CompatError>(())
//! ```

pub mod cfg;
pub mod error;
pub mod loader;
pub mod native;
pub mod provider;
pub mod registry;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cfg::ResolverConfig;
pub use error::{CompatError, LoadError};
pub use loader::{ChainLoader, DenyLoader, InProcessLoader, Loader};
pub use native::{DylibLoader, NativeProvider};
pub use provider::{CapabilityProvider, InProcessProvider, Operation, StandInProvider};
pub use registry::{
    cumesh, global, install_global, lookup, resolve, BindingInfo, Origin, Registry, CUMESH,
};
