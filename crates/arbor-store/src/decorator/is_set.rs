use arbor_schema::{Feature, Value};
use arbor_types::ObjectRef;

use super::cache::SlotCache;
use super::{displaced_slots, forward, slot, FeatureSlot};
use crate::error::StoreResult;
use crate::traits::Store;

/// Caches the result of [`Store::is_set`] per object and feature.
///
/// Every mutation records what it implies: writes and clears leave the
/// feature set, `unset` leaves it unset. A removal may empty the feature
/// so it just drops the entry.
pub struct IsSetCachingStore {
    inner: Box<dyn Store>,
    cache: SlotCache<bool>,
}

impl IsSetCachingStore {
    pub fn new(inner: Box<dyn Store>, capacity: usize) -> Self {
        Self {
            inner,
            cache: SlotCache::new(capacity),
        }
    }

    /// Run a mutation, then record `after` for the feature, or drop the
    /// entry when `after` is `None`.
    fn write<R>(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        displaced: Vec<FeatureSlot>,
        after: Option<bool>,
        op: impl FnOnce(&dyn Store) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let write = self.cache.begin(slot(object, feature), displaced);
        match op(self.inner.as_ref()) {
            Ok(out) => {
                self.cache.finish(write, |entries, target| match after {
                    Some(set) => {
                        entries.put(target, set);
                    }
                    None => {
                        entries.pop(&target);
                    }
                });
                Ok(out)
            }
            Err(e) => {
                self.cache.discard(write);
                Err(e)
            }
        }
    }
}

impl Store for IsSetCachingStore {
    fn is_set(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<bool> {
        let key = slot(object, feature);
        let ticket = match self.cache.read(&key, |set| Some(*set)) {
            Ok(set) => return Ok(set),
            Err(ticket) => ticket,
        };
        let set = self.inner.is_set(object, feature)?;
        self.cache.fill(key, ticket, set);
        Ok(set)
    }

    fn get(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>) -> StoreResult<Option<Value>> {
        let ticket = self.cache.ticket();
        let value = self.inner.get(object, feature, index)?;
        if feature.is_many() && value.is_some() {
            self.cache.fill(slot(object, feature), ticket, true);
        }
        Ok(value)
    }

    fn set(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        value: Value,
    ) -> StoreResult<Option<Value>> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, std::slice::from_ref(&value))?;
        self.write(object, feature, displaced, Some(true), |inner| {
            inner.set(object, feature, index, value)
        })
    }

    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.write(object, feature, Vec::new(), Some(false), |inner| {
            inner.unset(object, feature)
        })
    }

    fn contains(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<bool> {
        let ticket = self.cache.ticket();
        let found = self.inner.contains(object, feature, value)?;
        if found {
            self.cache.fill(slot(object, feature), ticket, true);
        }
        Ok(found)
    }

    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, std::slice::from_ref(&value))?;
        self.write(object, feature, displaced, Some(true), |inner| {
            inner.add(object, feature, index, value)
        })
    }

    fn add_all(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        values: Vec<Value>,
    ) -> StoreResult<()> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, &values)?;
        self.write(object, feature, displaced, Some(true), |inner| {
            inner.add_all(object, feature, index, values)
        })
    }

    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value> {
        self.write(object, feature, Vec::new(), None, |inner| {
            inner.remove(object, feature, index)
        })
    }

    fn move_value(&self, object: &ObjectRef, feature: &Feature, target: usize, source: usize) -> StoreResult<Value> {
        self.write(object, feature, Vec::new(), Some(true), |inner| {
            inner.move_value(object, feature, target, source)
        })
    }

    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.write(object, feature, Vec::new(), Some(feature.is_many()), |inner| {
            inner.clear(object, feature)
        })
    }

    fn close(&self) -> StoreResult<()> {
        self.cache.clear();
        self.inner.close()
    }

    forward!(inner: size, index_of, last_index_of, to_vec, container_of, resolve,
        update_instance_of, all_instances_of, save, backend, registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, feature, folder};
    use arbor_backend::TransientBackend;
    use std::sync::Arc;

    fn store() -> IsSetCachingStore {
        let base = fixtures::direct(Arc::new(TransientBackend::new()));
        IsSetCachingStore::new(Box::new(base), 16)
    }

    #[test]
    fn follows_set_and_unset() {
        let store = store();
        let tags = feature(&store.registry(), "Folder", "tags");
        let f = folder();
        assert!(!store.is_set(&f, &tags).unwrap());
        store.add(&f, &tags, None, "a".into()).unwrap();
        assert!(store.is_set(&f, &tags).unwrap());
        store.clear(&f, &tags).unwrap();
        assert!(store.is_set(&f, &tags).unwrap());
        store.unset(&f, &tags).unwrap();
        assert!(!store.is_set(&f, &tags).unwrap());
    }

    #[test]
    fn failed_write_does_not_poison_cache() {
        let store = store();
        let tags = feature(&store.registry(), "Folder", "tags");
        let f = folder();
        assert!(!store.is_set(&f, &tags).unwrap());
        assert!(store.add(&f, &tags, Some(3), "a".into()).is_err());
        assert!(!store.is_set(&f, &tags).unwrap());
    }

    #[test]
    fn removal_refreshes_from_inner() {
        let store = store();
        let tags = feature(&store.registry(), "Folder", "tags");
        let f = folder();
        store.add(&f, &tags, None, "a".into()).unwrap();
        store.remove(&f, &tags, 0).unwrap();
        assert_eq!(store.is_set(&f, &tags).unwrap(), store.inner.is_set(&f, &tags).unwrap());
    }

    #[test]
    fn concurrent_reads_never_pin_an_old_flag() {
        for _ in 0..50 {
            let store = store();
            let tags = feature(&store.registry(), "Folder", "tags");
            let f = folder();
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for i in 0..100 {
                        if i % 2 == 0 {
                            store.add(&f, &tags, None, "t".into()).unwrap();
                        } else {
                            store.unset(&f, &tags).unwrap();
                        }
                    }
                });
                scope.spawn(|| {
                    for _ in 0..100 {
                        store.is_set(&f, &tags).unwrap();
                    }
                });
            });
            assert!(!store.is_set(&f, &tags).unwrap());
        }
    }
}
