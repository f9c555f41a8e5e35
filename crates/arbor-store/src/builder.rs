use std::sync::Arc;

use tracing::debug;

use crate::decorator::{
    AutoSaveStore, FeatureCachingStore, IsSetCachingStore, LoadedObjectCounterStore, LoadedObjects,
    LoggingStore, ReadOnlyStore, SizeCachingStore,
};
use crate::option::StoreOption;
use crate::traits::Store;

/// Default capacity of the caching decorators.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A decorated store, plus the load counter when one was requested.
pub struct BuiltStore {
    pub store: Arc<dyn Store>,
    pub loaded: Option<Arc<LoadedObjects>>,
}

/// Wraps a base store with decorators.
///
/// Options apply in order: the first one wraps the base store, each later
/// one wraps the result, so the last option sees calls first.
pub struct StoreBuilder {
    base: Box<dyn Store>,
    options: Vec<StoreOption>,
    cache_capacity: usize,
}

impl StoreBuilder {
    pub fn new(base: Box<dyn Store>) -> Self {
        Self {
            base,
            options: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn option(mut self, option: StoreOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = StoreOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> BuiltStore {
        let capacity = self.cache_capacity;
        let mut loaded = None;
        let mut store = self.base;
        for option in self.options {
            debug!(%option, "decorating store");
            store = match option {
                StoreOption::CacheIsSet => Box::new(IsSetCachingStore::new(store, capacity)),
                StoreOption::CacheSize => Box::new(SizeCachingStore::new(store, capacity)),
                StoreOption::CacheFeatures => Box::new(FeatureCachingStore::new(store, capacity)),
                StoreOption::ReadOnly => Box::new(ReadOnlyStore::new(store)),
                StoreOption::AutoSave { chunk } => Box::new(AutoSaveStore::new(store, chunk)),
                StoreOption::Log { level } => Box::new(LoggingStore::new(store, level)),
                StoreOption::CountLoadedObjects => {
                    let counter = LoadedObjectCounterStore::new(store);
                    loaded = Some(counter.loaded());
                    Box::new(counter)
                }
            };
        }
        BuiltStore {
            store: Arc::from(store),
            loaded,
        }
    }
}
