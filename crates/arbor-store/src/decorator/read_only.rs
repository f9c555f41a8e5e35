use arbor_schema::{Feature, Value};
use arbor_types::ObjectRef;

use super::forward;
use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// Rejects every mutation with [`StoreError::ReadOnly`].
pub struct ReadOnlyStore {
    inner: Box<dyn Store>,
}

impl ReadOnlyStore {
    pub fn new(inner: Box<dyn Store>) -> Self {
        Self { inner }
    }
}

impl Store for ReadOnlyStore {
    fn set(&self, _: &ObjectRef, _: &Feature, _: Option<usize>, _: Value) -> StoreResult<Option<Value>> {
        Err(StoreError::ReadOnly)
    }

    fn unset(&self, _: &ObjectRef, _: &Feature) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    fn add(&self, _: &ObjectRef, _: &Feature, _: Option<usize>, _: Value) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    fn add_all(&self, _: &ObjectRef, _: &Feature, _: Option<usize>, _: Vec<Value>) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    fn remove(&self, _: &ObjectRef, _: &Feature, _: usize) -> StoreResult<Value> {
        Err(StoreError::ReadOnly)
    }

    fn move_value(&self, _: &ObjectRef, _: &Feature, _: usize, _: usize) -> StoreResult<Value> {
        Err(StoreError::ReadOnly)
    }

    fn clear(&self, _: &ObjectRef, _: &Feature) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    fn update_instance_of(&self, _: &ObjectRef) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    forward!(inner: get, is_set, size, contains, index_of, last_index_of, to_vec,
        container_of, resolve, all_instances_of, save, close, backend, registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, feature, file, folder};
    use arbor_backend::TransientBackend;
    use std::sync::Arc;

    #[test]
    fn mutations_are_rejected_reads_pass() {
        let base = fixtures::direct(Arc::new(TransientBackend::new()));
        let size = feature(&base.registry(), "File", "size");
        let tags = feature(&base.registry(), "Folder", "tags");
        let f = file();
        base.set(&f, &size, None, Value::Int(9)).unwrap();

        let store = ReadOnlyStore::new(Box::new(base));
        assert_eq!(store.get(&f, &size, None).unwrap(), Some(Value::Int(9)));
        assert!(matches!(store.set(&f, &size, None, Value::Int(1)), Err(StoreError::ReadOnly)));
        assert!(matches!(store.unset(&f, &size), Err(StoreError::ReadOnly)));
        assert!(matches!(store.add(&folder(), &tags, None, "a".into()), Err(StoreError::ReadOnly)));
        assert!(matches!(store.clear(&folder(), &tags), Err(StoreError::ReadOnly)));
        assert!(matches!(store.update_instance_of(&folder()), Err(StoreError::ReadOnly)));
        assert_eq!(store.get(&f, &size, None).unwrap(), Some(Value::Int(9)));
    }
}
