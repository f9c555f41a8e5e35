use std::collections::HashSet;
use std::sync::Arc;

use arbor_schema::{Feature, Value};
use arbor_types::{Id, ObjectRef};
use parking_lot::Mutex;
use tracing::info;

use super::forward;
use crate::error::StoreResult;
use crate::traits::Store;

/// Set of distinct objects read through a [`LoadedObjectCounterStore`].
#[derive(Debug, Default)]
pub struct LoadedObjects {
    ids: Mutex<HashSet<Id>>,
}

impl LoadedObjects {
    pub fn count(&self) -> usize {
        self.ids.lock().len()
    }

    fn record(&self, id: Id) {
        self.ids.lock().insert(id);
    }
}

/// Records the id of every object that is read or resolved.
pub struct LoadedObjectCounterStore {
    inner: Box<dyn Store>,
    loaded: Arc<LoadedObjects>,
}

impl LoadedObjectCounterStore {
    pub fn new(inner: Box<dyn Store>) -> Self {
        Self {
            inner,
            loaded: Arc::new(LoadedObjects::default()),
        }
    }

    /// Shared handle on the counter; it outlives the store.
    pub fn loaded(&self) -> Arc<LoadedObjects> {
        self.loaded.clone()
    }

    fn touch(&self, object: &ObjectRef) {
        self.loaded.record(object.id());
    }
}

impl Store for LoadedObjectCounterStore {
    fn get(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>) -> StoreResult<Option<Value>> {
        self.touch(object);
        self.inner.get(object, feature, index)
    }

    fn is_set(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<bool> {
        self.touch(object);
        self.inner.is_set(object, feature)
    }

    fn size(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<usize> {
        self.touch(object);
        self.inner.size(object, feature)
    }

    fn contains(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<bool> {
        self.touch(object);
        self.inner.contains(object, feature, value)
    }

    fn index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>> {
        self.touch(object);
        self.inner.index_of(object, feature, value)
    }

    fn last_index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>> {
        self.touch(object);
        self.inner.last_index_of(object, feature, value)
    }

    fn to_vec(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<Vec<Value>> {
        self.touch(object);
        self.inner.to_vec(object, feature)
    }

    fn resolve(&self, id: Id) -> StoreResult<ObjectRef> {
        let object = self.inner.resolve(id)?;
        self.touch(&object);
        Ok(object)
    }

    fn close(&self) -> StoreResult<()> {
        info!(loaded = self.loaded.count(), "distinct objects loaded");
        self.inner.close()
    }

    forward!(inner: set, unset, add, add_all, remove, move_value, clear, container_of,
        update_instance_of, all_instances_of, save, backend, registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, feature, file, folder};
    use arbor_backend::TransientBackend;

    #[test]
    fn counts_distinct_reads() {
        let base = fixtures::direct(Arc::new(TransientBackend::new()));
        let store = LoadedObjectCounterStore::new(Box::new(base));
        let loaded = store.loaded();
        let size = feature(&store.registry(), "File", "size");
        let tags = feature(&store.registry(), "Folder", "tags");
        let (a, b) = (file(), folder());

        store.set(&a, &size, None, Value::Int(1)).unwrap();
        assert_eq!(loaded.count(), 0);
        store.get(&a, &size, None).unwrap();
        store.get(&a, &size, None).unwrap();
        store.size(&b, &tags).unwrap();
        assert_eq!(loaded.count(), 2);

        store.close().unwrap();
        assert_eq!(loaded.count(), 2);
    }
}
