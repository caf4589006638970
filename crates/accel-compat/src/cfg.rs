//! Resolver configuration.
//!
//! Policy
//! - Defaults come from the environment so a host can redirect or disable
//!   extensions without code changes. Hosts that need more control build a
//!   `ResolverConfig` (or a `Registry` with their own loader) directly.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::{DenyLoader, Loader};
use crate::native::DylibLoader;

/// Directories searched for native extensions (platform path-list syntax).
pub const ENV_SEARCH_PATH: &str = "ACCEL_COMPAT_PATH";
/// Comma-separated capability names that always resolve to a stand-in.
pub const ENV_DISABLE: &str = "ACCEL_COMPAT_DISABLE";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    #[serde(default)]
    pub disabled: BTreeSet<String>,
}

impl ResolverConfig {
    /// Read `ACCEL_COMPAT_PATH` and `ACCEL_COMPAT_DISABLE`.
    pub fn from_env() -> Self {
        let search = std::env::var_os(ENV_SEARCH_PATH);
        let disable = std::env::var(ENV_DISABLE).ok();
        Self::from_values(search.as_deref(), disable.as_deref())
    }

    fn from_values(search: Option<&OsStr>, disable: Option<&str>) -> Self {
        let search_paths = search
            .map(|s| {
                std::env::split_paths(s)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let disabled = disable
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            search_paths,
            disabled,
        }
    }

    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn with_disabled(mut self, name: impl Into<String>) -> Self {
        self.disabled.insert(name.into());
        self
    }

    /// Shared-library loader honouring the disabled set.
    pub fn loader(&self) -> impl Loader {
        DenyLoader::new(
            DylibLoader::new(self.search_paths.iter().cloned()),
            self.disabled.iter().cloned(),
        )
    }
}
