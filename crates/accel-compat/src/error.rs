//! Error types for resolution and operation calls.
//!
//! Two layers:
//! - `LoadError` is what a `Loader` reports. `NotFound` is the expected
//!   "extension not installed" outcome and never leaves the resolver.
//! - `CompatError` is what consumers see: deferred `Unavailable` failures from
//!   a stand-in, hard `LoadFailure`s, and operation-level failures.

use std::path::PathBuf;

use thiserror::Error;

/// Outcome of a failed acquisition attempt at the loader boundary.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The provider is simply not installed.
    #[error("capability `{capability}` not found (searched {} location(s))", .searched.len())]
    NotFound {
        capability: String,
        searched: Vec<PathBuf>,
    },
    /// The provider exists but could not be acquired.
    #[error("capability `{capability}` is present but broken{}: {reason}", fmt_path(.path))]
    Failed {
        capability: String,
        path: Option<PathBuf>,
        reason: String,
    },
}

impl LoadError {
    pub fn not_found(capability: impl Into<String>) -> Self {
        Self::NotFound {
            capability: capability.into(),
            searched: Vec::new(),
        }
    }

    pub fn failed(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            capability: capability.into(),
            path: None,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced to consumers of the resolver and of providers.
#[derive(Debug, Clone, Error)]
pub enum CompatError {
    /// The operation was requested on a stand-in: the native extension is absent.
    #[error(
        "{capability}.{operation} not available - native extension not installed, \
         use the fallback implementation instead"
    )]
    Unavailable {
        capability: String,
        operation: String,
    },
    /// The provider was found but is malformed, incompatible or otherwise broken.
    #[error("failed to load capability `{capability}`{}: {reason}", fmt_path(.path))]
    LoadFailure {
        capability: String,
        path: Option<PathBuf>,
        reason: String,
    },
    /// A real provider does not export the requested operation.
    #[error("capability `{capability}` has no operation `{operation}`")]
    MissingOperation {
        capability: String,
        operation: String,
    },
    /// A real operation ran and reported a failure status.
    #[error("{capability}.{operation} failed with status {code}")]
    OperationFailed {
        capability: String,
        operation: String,
        code: isize,
    },
    /// The operation asked for a larger output buffer again after the retry.
    #[error("{capability}.{operation} still requested a larger output buffer ({requested} floats) after retrying")]
    UnstableOutputSize {
        capability: String,
        operation: String,
        requested: usize,
    },
    /// Capability and operation names must be non-empty `[A-Za-z0-9_]+`.
    #[error("invalid name `{0}` (expected ASCII letters, digits or `_`)")]
    InvalidName(String),
}

impl CompatError {
    pub fn unavailable(capability: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unavailable {
            capability: capability.into(),
            operation: operation.into(),
        }
    }

    /// True for the deferred failure raised by a stand-in.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl From<LoadError> for CompatError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Failed {
                capability,
                path,
                reason,
            } => Self::LoadFailure {
                capability,
                path,
                reason,
            },
            // Only reachable when a caller bypasses the resolver.
            LoadError::NotFound { capability, .. } => Self::LoadFailure {
                capability,
                path: None,
                reason: "not found".to_string(),
            },
        }
    }
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" from {}", p.display()),
        None => String::new(),
    }
}

/// Check that `name` is usable as a capability or operation name.
pub(crate) fn validate_name(name: &str) -> Result<(), CompatError> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Ok(())
    } else {
        Err(CompatError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_names_capability_and_operation() {
        let msg = CompatError::unavailable("cumesh", "remesh").to_string();
        assert!(msg.starts_with("cumesh.remesh not available"));
        assert!(msg.contains("fallback"));
    }

    #[test]
    fn load_failure_keeps_path_and_reason() {
        let err: CompatError = LoadError::Failed {
            capability: "accel".into(),
            path: Some(PathBuf::from("/opt/ext/libaccel.so")),
            reason: "invalid ELF header".into(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("/opt/ext/libaccel.so"));
        assert!(msg.contains("invalid ELF header"));
        assert!(!err.is_unavailable());
    }

    #[test]
    fn names_are_validated() {
        assert!(validate_name("cumesh").is_ok());
        assert!(validate_name("cu_mesh2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../lib").is_err());
        assert!(validate_name("a.b").is_err());
    }
}
