//! Native extensions loaded from shared libraries.
//!
//! ABI expected from an extension named `NAME`:
//! - `int32_t accel_compat_init(void)`: called once after `dlopen`; non-zero
//!   means the extension refuses to run (wrong driver, missing device, ...).
//! - one symbol per operation, `NAME_OP`, with signature
//!   `isize NAME_OP(const float *in, size_t in_len, float *out, size_t out_cap)`.
//!   A non-negative return is the number of output floats. If it exceeds
//!   `out_cap` the caller retries once with a buffer of that size. Negative
//!   returns are error codes.
//!
//! Libraries are opened with `RTLD_NOW` so unresolved symbols surface as a
//! load failure instead of a crash on first call.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{validate_name, CompatError, LoadError};
use crate::loader::Loader;
use crate::provider::{CapabilityProvider, Operation};

/// Entry symbol every extension must export.
pub const INIT_SYMBOL: &str = "accel_compat_init";

type InitFn = unsafe extern "C" fn() -> i32;
type RawOpFn = unsafe extern "C" fn(*const f32, usize, *mut f32, usize) -> isize;

/// Platform file name for the extension `name`, e.g. `libcumesh.so`.
pub fn library_file_name(name: &str) -> String {
    format!("{DLL_PREFIX}{name}{DLL_SUFFIX}")
}

/// Finds extensions as shared libraries in a list of directories.
#[derive(Debug, Clone, Default)]
pub struct DylibLoader {
    search_paths: Vec<PathBuf>,
}

impl DylibLoader {
    pub fn new(search_paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_paths: search_paths.into_iter().collect(),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// First existing library file for `name`, in search order.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let file = library_file_name(name);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file))
            .find(|candidate| candidate.is_file())
    }
}

impl Loader for DylibLoader {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
        let Some(path) = self.locate(name) else {
            tracing::debug!(
                capability = name,
                dirs = self.search_paths.len(),
                "no native extension on search path"
            );
            return Err(LoadError::NotFound {
                capability: name.to_string(),
                searched: self.search_paths.clone(),
            });
        };
        if cfg!(not(unix)) {
            // No dynamic loader on this platform: an installed file is as good as absent.
            tracing::warn!(
                capability = name,
                path = %path.display(),
                "native extensions cannot be loaded on this platform"
            );
            return Err(LoadError::NotFound {
                capability: name.to_string(),
                searched: self.search_paths.clone(),
            });
        }
        let provider = NativeProvider::open(name, &path).map_err(|reason| LoadError::Failed {
            capability: name.to_string(),
            path: Some(path.clone()),
            reason,
        })?;
        Ok(Arc::new(provider))
    }
}

/// Provider backed by a loaded shared library.
pub struct NativeProvider {
    name: String,
    path: PathBuf,
    lib: Arc<sys::Library>,
}

impl NativeProvider {
    /// Open the library at `path` and run its init hook.
    fn open(name: &str, path: &Path) -> Result<Self, String> {
        tracing::debug!(capability = name, path = %path.display(), "opening native extension");
        let lib = sys::Library::open(path)?;
        let init = lib
            .symbol(INIT_SYMBOL)
            .ok_or_else(|| format!("missing entry symbol `{INIT_SYMBOL}`"))?;
        // SAFETY: the extension ABI fixes the signature of the init symbol.
        let status = unsafe { std::mem::transmute::<*mut c_void, InitFn>(init)() };
        if status != 0 {
            return Err(format!("`{INIT_SYMBOL}` returned status {status}"));
        }
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            lib: Arc::new(lib),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for NativeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProvider")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl CapabilityProvider for NativeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn operation(&self, operation: &str) -> Result<Operation, CompatError> {
        validate_name(operation)?;
        let symbol = format!("{}_{}", self.name, operation);
        let Some(ptr) = self.lib.symbol(&symbol) else {
            return Err(CompatError::MissingOperation {
                capability: self.name.clone(),
                operation: operation.to_string(),
            });
        };
        // SAFETY: operation symbols follow the ABI documented at module level.
        let raw = unsafe { std::mem::transmute::<*mut c_void, RawOpFn>(ptr) };
        let lib = Arc::clone(&self.lib);
        let (capability, op_name) = (self.name.clone(), operation.to_string());
        Ok(Operation::new(&self.name, operation, move |input| {
            // Keeps the library mapped for as long as the handle lives.
            let _lib = &lib;
            call_raw(raw, input).map_err(|err| match err {
                RawCallError::Status(code) => CompatError::OperationFailed {
                    capability: capability.clone(),
                    operation: op_name.clone(),
                    code,
                },
                RawCallError::OutputSize(requested) => CompatError::UnstableOutputSize {
                    capability: capability.clone(),
                    operation: op_name.clone(),
                    requested,
                },
            })
        }))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RawCallError {
    /// Negative status returned by the extension.
    Status(isize),
    /// Still asked for more room after the retry.
    OutputSize(usize),
}

fn call_raw(raw: RawOpFn, input: &[f32]) -> Result<Vec<f32>, RawCallError> {
    let mut cap = input.len();
    for _ in 0..2 {
        let mut out = vec![0f32; cap];
        // SAFETY: `out` has room for `cap` floats and `input` is a valid slice.
        let n = unsafe { raw(input.as_ptr(), input.len(), out.as_mut_ptr(), cap) };
        if n < 0 {
            return Err(RawCallError::Status(n));
        }
        let n = n as usize;
        if n <= cap {
            out.truncate(n);
            return Ok(out);
        }
        cap = n;
    }
    Err(RawCallError::OutputSize(cap))
}

#[cfg(unix)]
mod sys {
    use std::ffi::{c_char, c_int, c_void, CStr, CString};
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr::NonNull;

    const RTLD_NOW: c_int = 2;

    extern "C" {
        fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
        fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
        fn dlclose(handle: *mut c_void) -> c_int;
        fn dlerror() -> *mut c_char;
    }

    pub(super) struct Library {
        handle: NonNull<c_void>,
    }

    // The handle is only passed to the thread-safe dl* functions.
    unsafe impl Send for Library {}
    unsafe impl Sync for Library {}

    impl Library {
        pub(super) fn open(path: &Path) -> Result<Self, String> {
            let c_path = CString::new(path.as_os_str().as_bytes())
                .map_err(|_| "path contains a NUL byte".to_string())?;
            // SAFETY: `c_path` is NUL-terminated and outlives the call.
            let handle = unsafe { dlopen(c_path.as_ptr(), RTLD_NOW) };
            NonNull::new(handle)
                .map(|handle| Self { handle })
                .ok_or_else(last_error)
        }

        pub(super) fn symbol(&self, name: &str) -> Option<*mut c_void> {
            let c_name = CString::new(name).ok()?;
            // SAFETY: valid handle from `dlopen`, NUL-terminated name.
            let ptr = unsafe { dlsym(self.handle.as_ptr(), c_name.as_ptr()) };
            (!ptr.is_null()).then_some(ptr)
        }
    }

    impl Drop for Library {
        fn drop(&mut self) {
            // SAFETY: every operation holds an `Arc<Library>`, so no symbol
            // from this handle can still be called.
            unsafe {
                dlclose(self.handle.as_ptr());
            }
        }
    }

    fn last_error() -> String {
        // SAFETY: `dlerror` returns null or a thread-local C string.
        let msg = unsafe { dlerror() };
        if msg.is_null() {
            "dlopen failed".to_string()
        } else {
            unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use std::ffi::c_void;
    use std::path::Path;

    pub(super) struct Library;

    impl Library {
        pub(super) fn open(_path: &Path) -> Result<Self, String> {
            Err("dynamic loading of extensions is not supported on this platform".to_string())
        }

        pub(super) fn symbol(&self, _name: &str) -> Option<*mut c_void> {
            None
        }
    }
}
