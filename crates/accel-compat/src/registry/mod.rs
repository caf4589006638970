//! Capability resolver and the process-wide registry of bindings.
//!
//! Purpose
//! - Resolve a capability name once: bind the real provider when the loader
//!   finds it, or a `StandInProvider` when it is simply not installed.
//! - Publish the result so every later consumer gets the same `Arc`.
//!
//! Concurrency
//! - Each name owns a one-time-init cell. The first caller runs the loader;
//!   concurrent callers for the same name block until the binding is
//!   published. Different names resolve independently.
//! - A hard load failure leaves the cell empty, so the next call retries.
//! - Bindings are never replaced or removed.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::Serialize;

use crate::cfg::ResolverConfig;
use crate::error::{validate_name, CompatError, LoadError};
use crate::loader::Loader;
use crate::provider::{CapabilityProvider, StandInProvider};

/// The mesh extension this shim was first written for.
pub const CUMESH: &str = "cumesh";

/// How a binding came to be. Diagnostics only; providers never expose this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Origin {
    /// The loader supplied a real provider.
    Loaded,
    /// Nothing was found; `searched` lists where the loader looked.
    StandIn { searched: Vec<PathBuf> },
}

/// Serializable summary of one binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingInfo {
    pub name: String,
    pub origin: Origin,
    pub provider: String,
}

struct Binding {
    provider: Arc<dyn CapabilityProvider>,
    origin: Origin,
}

type Slot = Arc<OnceCell<Binding>>;

/// Name to provider bindings, resolved on first use.
pub struct Registry {
    loader: Box<dyn Loader>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl Registry {
    pub fn new(loader: impl Loader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Registry over shared libraries described by `cfg`.
    pub fn from_config(cfg: &ResolverConfig) -> Self {
        Self::new(cfg.loader())
    }

    /// Return the provider bound to `name`, resolving it on first use.
    ///
    /// A missing extension yields a stand-in and is not an error. A broken
    /// one yields `CompatError::LoadFailure` and binds nothing.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, CompatError> {
        validate_name(name)?;
        let slot = self.slot(name);
        let binding = slot.get_or_try_init(|| self.acquire(name))?;
        Ok(Arc::clone(&binding.provider))
    }

    /// The provider already bound to `name`, if any. Never triggers loading.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CapabilityProvider>> {
        self.binding(name, |b| Arc::clone(&b.provider))
    }

    pub fn describe(&self, name: &str) -> Option<BindingInfo> {
        self.binding(name, |b| info(name, b))
    }

    /// All published bindings, sorted by name.
    pub fn bindings(&self) -> Vec<BindingInfo> {
        let slots = self.slots.read();
        let mut out: Vec<_> = slots
            .iter()
            .filter_map(|(name, slot)| slot.get().map(|b| info(name, b)))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn binding<T>(&self, name: &str, f: impl FnOnce(&Binding) -> T) -> Option<T> {
        self.slots.read().get(name)?.get().map(f)
    }

    fn slot(&self, name: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(name) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    fn acquire(&self, name: &str) -> Result<Binding, CompatError> {
        match self.loader.load(name) {
            Ok(provider) => {
                tracing::info!(capability = name, provider = ?provider, "bound native provider");
                Ok(Binding {
                    provider,
                    origin: Origin::Loaded,
                })
            }
            Err(LoadError::NotFound { searched, .. }) => {
                tracing::info!(
                    capability = name,
                    searched = searched.len(),
                    "native extension not installed, binding stand-in"
                );
                Ok(Binding {
                    provider: Arc::new(StandInProvider::new(name)),
                    origin: Origin::StandIn { searched },
                })
            }
            Err(err) => {
                tracing::warn!(capability = name, error = %err, "native extension failed to load");
                Err(err.into())
            }
        }
    }
}

fn info(name: &str, b: &Binding) -> BindingInfo {
    BindingInfo {
        name: name.to_string(),
        origin: b.origin.clone(),
        provider: format!("{:?}", b.provider),
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.slots.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}

static GLOBAL: OnceCell<Registry> = OnceCell::new();

/// The process-wide registry, built from `ResolverConfig::from_env` unless
/// `install_global` ran first.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(|| {
        let cfg = ResolverConfig::from_env();
        tracing::debug!(?cfg, "initialising global capability registry");
        Registry::from_config(&cfg)
    })
}

/// Install `registry` as the process-wide registry.
///
/// Must run before the first `global()` call; otherwise the rejected
/// registry is handed back.
pub fn install_global(registry: Registry) -> Result<&'static Registry, Registry> {
    GLOBAL.set(registry)?;
    Ok(global())
}

/// `global().resolve(name)`.
pub fn resolve(name: &str) -> Result<Arc<dyn CapabilityProvider>, CompatError> {
    global().resolve(name)
}

/// `global().lookup(name)`.
pub fn lookup(name: &str) -> Option<Arc<dyn CapabilityProvider>> {
    global().lookup(name)
}

/// The `cumesh` provider from the process-wide registry.
pub fn cumesh() -> Result<Arc<dyn CapabilityProvider>, CompatError> {
    resolve(CUMESH)
}
