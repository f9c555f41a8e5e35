use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::{BackendConfig, Descriptor, EngineKind};
use crate::engine::{FileEngine, MemoryEngine};
use crate::error::{BackendError, BackendResult};
use crate::mapped::MappedBackend;
use crate::memory::TransientBackend;
use crate::traits::Backend;

/// Creates backends of one kind.
pub trait BackendFactory: Send + Sync {
    /// Name recorded in the descriptor of backends this factory creates.
    fn name(&self) -> &'static str;

    /// A backend for objects that are not attached to any resource.
    fn create_transient(&self) -> BackendResult<Arc<dyn Backend>> {
        Ok(Arc::new(TransientBackend::new()))
    }

    /// A backend for a resource, as described by `config`.
    fn create_persistent(&self, config: &BackendConfig) -> BackendResult<Arc<dyn Backend>>;
}

/// Mapped backends over [`MemoryEngine`]: full mapping semantics, no durability.
#[derive(Debug, Default)]
pub struct MemoryBackendFactory;

impl BackendFactory for MemoryBackendFactory {
    fn name(&self) -> &'static str {
        EngineKind::Memory.factory_name()
    }

    fn create_persistent(&self, config: &BackendConfig) -> BackendResult<Arc<dyn Backend>> {
        Ok(Arc::new(MappedBackend::new(MemoryEngine::new(), config.mapping)))
    }
}

/// Mapped backends over [`FileEngine`].
///
/// The data directory carries a [`Descriptor`]; it is written on first
/// creation and checked on every later open.
#[derive(Debug, Default)]
pub struct FileBackendFactory;

impl BackendFactory for FileBackendFactory {
    fn name(&self) -> &'static str {
        EngineKind::File.factory_name()
    }

    fn create_persistent(&self, config: &BackendConfig) -> BackendResult<Arc<dyn Backend>> {
        let dir = config.require_path()?;
        match Descriptor::read(dir)? {
            Some(existing) => existing.check(self.name(), config.mapping)?,
            None => {
                Descriptor::new(self.name(), config.mapping).write_if_absent(dir)?;
            }
        }
        let engine = FileEngine::open(dir)?;
        info!(dir = %dir.display(), mapping = %config.mapping, "file backend opened");
        Ok(Arc::new(MappedBackend::new(engine, config.mapping)))
    }
}

/// Explicit registry of backend factories, keyed by name.
pub struct BackendRegistry {
    factories: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding the `memory` and `file` factories.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(MemoryBackendFactory));
        registry.register(Arc::new(FileBackendFactory));
        registry
    }

    /// Register a factory, replacing any factory of the same name.
    pub fn register(&self, factory: Arc<dyn BackendFactory>) -> Option<Arc<dyn BackendFactory>> {
        self.factories
            .write()
            .insert(factory.name().to_string(), factory)
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn BackendFactory>> {
        self.factories.write().remove(name)
    }

    pub fn get(&self, name: &str) -> BackendResult<Arc<dyn BackendFactory>> {
        self.factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Create the backend described by `config`.
    pub fn open(&self, config: &BackendConfig) -> BackendResult<Arc<dyn Backend>> {
        self.get(config.engine.factory_name())?
            .create_persistent(config)
    }

    /// Reopen an existing data directory, routed by its descriptor.
    pub fn open_dir(&self, dir: &Path) -> BackendResult<Arc<dyn Backend>> {
        let descriptor = Descriptor::read(dir)?.ok_or_else(|| {
            BackendError::InvalidConfig(format!("{} has no descriptor", dir.display()))
        })?;
        let factory = self.get(&descriptor.backend)?;
        let config = BackendConfig {
            engine: match descriptor.backend.as_str() {
                "memory" => EngineKind::Memory,
                _ => EngineKind::File,
            },
            mapping: descriptor.mapping,
            path: Some(dir.to_path_buf()),
        };
        factory.create_persistent(&config)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("factories", &self.names())
            .finish()
    }
}
