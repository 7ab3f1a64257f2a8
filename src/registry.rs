//! Backend registry.
//!
//! Decouples "which backend is configured" from "which implementation is
//! constructed": names map to deferred factories, not instances, so a
//! backend's construction cost is only paid by callers that resolve it.
//! Plugins may re-register a built-in name to override it.

use crate::backend::{Backend, FileBackend, SqliteBackend};
use crate::error::{Error, Result};
use crate::graph::GraphBackend;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// A deferred backend constructor: store location in, backend out.
pub type BackendFactory = Arc<dyn Fn(&Path) -> Result<Box<dyn Backend>> + Send + Sync>;

/// Registry mapping backend names to deferred factories.
pub struct BackendRegistry {
    factories: Mutex<HashMap<String, BackendFactory>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { factories: Mutex::new(HashMap::new()) }
    }

    /// Create a registry with the built-in `"file"` and `"sqlite"`
    /// backends registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register("file", Arc::new(|path| Ok(Box::new(FileBackend::new(path)?))));
        registry.register("sqlite", Arc::new(|path| Ok(Box::new(SqliteBackend::new(path)?))));
        registry
    }

    /// Register a factory under a name.
    ///
    /// Re-registering an existing name overwrites the previous factory;
    /// this is intentional so plugins can override built-ins.
    pub fn register(&self, name: &str, factory: BackendFactory) {
        self.lock().insert(name.to_string(), factory);
    }

    /// Resolve a name and construct a backend for the given store location.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnknownBackend`] if no factory is registered
    /// under the name, or with the factory's own error if construction
    /// fails.
    pub fn resolve(&self, name: &str, store_path: &Path) -> Result<Box<dyn Backend>> {
        let factory = self
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownBackend(name.to_string()))?;
        factory(store_path)
    }

    /// Resolve a name and ensure the result offers the dependency contract.
    ///
    /// Backends that already declare the contract (e.g. `sqlite`) are
    /// returned as-is; anything else is wrapped in [`GraphBackend`] with a
    /// sidecar edge file next to the store.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::resolve`].
    pub fn resolve_with_graph(&self, name: &str, store_path: &Path) -> Result<Box<dyn Backend>> {
        let backend = self.resolve(name, store_path)?;
        if backend.as_dependency_tracker().is_some() {
            return Ok(backend);
        }
        Ok(Box::new(GraphBackend::for_store(backend, store_path)))
    }

    /// Names currently registered, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BackendFactory>> {
        self.factories.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Process-wide default registry with the built-ins registered.
static DEFAULT_REGISTRY: Lazy<BackendRegistry> = Lazy::new(BackendRegistry::with_builtins);

/// The process-wide default registry.
///
/// Plugins append their factories here before first resolution.
#[must_use]
pub fn default_registry() -> &'static BackendRegistry {
    &DEFAULT_REGISTRY
}
