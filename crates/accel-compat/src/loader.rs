//! The acquisition boundary: how a provider is found by name.
//!
//! A `Loader` must tell "not installed" (`LoadError::NotFound`) apart from
//! "installed but broken" (`LoadError::Failed`). Only the former is turned
//! into a stand-in by the resolver.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::LoadError;
use crate::provider::CapabilityProvider;

/// Source of real capability providers.
pub trait Loader: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError>;
}

impl<L: Loader + ?Sized> Loader for Box<L> {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
        (**self).load(name)
    }
}

impl<L: Loader + ?Sized> Loader for Arc<L> {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
        (**self).load(name)
    }
}

/// Providers registered by the host process, looked up by name.
#[derive(Default)]
pub struct InProcessLoader {
    providers: HashMap<String, Arc<dyn CapabilityProvider>>,
}

impl InProcessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own name, replacing any earlier entry.
    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }
}

impl Loader for InProcessLoader {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::not_found(name))
    }
}

impl fmt::Debug for InProcessLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("InProcessLoader")
            .field("providers", &names)
            .finish()
    }
}

/// Tries each loader in turn.
///
/// `NotFound` falls through to the next loader; any other failure stops the
/// chain so a broken install is never hidden by a later miss.
#[derive(Default)]
pub struct ChainLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl ChainLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, loader: impl Loader + 'static) -> Self {
        self.loaders.push(Box::new(loader));
        self
    }
}

impl Loader for ChainLoader {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
        let mut searched = Vec::new();
        for loader in &self.loaders {
            match loader.load(name) {
                Ok(provider) => return Ok(provider),
                Err(LoadError::NotFound { searched: s, .. }) => searched.extend(s),
                Err(err) => return Err(err),
            }
        }
        Err(LoadError::NotFound {
            capability: name.to_string(),
            searched,
        })
    }
}

/// Reports `NotFound` for disabled names without consulting the inner loader.
pub struct DenyLoader<L> {
    inner: L,
    denied: BTreeSet<String>,
}

impl<L: Loader> DenyLoader<L> {
    pub fn new(inner: L, denied: impl IntoIterator<Item = String>) -> Self {
        Self {
            inner,
            denied: denied.into_iter().collect(),
        }
    }
}

impl<L: Loader> Loader for DenyLoader<L> {
    fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
        if self.denied.contains(name) {
            tracing::debug!(capability = name, "capability disabled by configuration");
            return Err(LoadError::not_found(name));
        }
        self.inner.load(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InProcessProvider;

    struct Broken;

    impl Loader for Broken {
        fn load(&self, name: &str) -> Result<Arc<dyn CapabilityProvider>, LoadError> {
            Err(LoadError::failed(name, "corrupted"))
        }
    }

    fn accel() -> Arc<dyn CapabilityProvider> {
        Arc::new(
            InProcessProvider::new("accel")
                .with_operation("compute", |x| Ok(x.to_vec()))
                .unwrap(),
        )
    }

    #[test]
    fn in_process_loader_returns_registered_provider() {
        let p = accel();
        let loader = InProcessLoader::new().with_provider(p.clone());
        assert!(Arc::ptr_eq(&loader.load("accel").unwrap(), &p));
        assert!(loader.load("other").unwrap_err().is_not_found());
    }

    #[test]
    fn chain_falls_through_misses_only() {
        let p = accel();
        let chain = ChainLoader::new()
            .then(InProcessLoader::new())
            .then(InProcessLoader::new().with_provider(p.clone()));
        assert!(Arc::ptr_eq(&chain.load("accel").unwrap(), &p));
        assert!(chain.load("missing").unwrap_err().is_not_found());

        let chain = ChainLoader::new()
            .then(Broken)
            .then(InProcessLoader::new().with_provider(p));
        assert!(matches!(
            chain.load("accel"),
            Err(LoadError::Failed { .. })
        ));
    }

    #[test]
    fn deny_loader_hides_disabled_names() {
        let loader = DenyLoader::new(
            InProcessLoader::new().with_provider(accel()),
            ["accel".to_string()],
        );
        assert!(loader.load("accel").unwrap_err().is_not_found());

        let loader = DenyLoader::new(InProcessLoader::new().with_provider(accel()), Vec::new());
        assert!(loader.load("accel").is_ok());
    }
}
