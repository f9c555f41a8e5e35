use std::collections::HashMap;

use arbor_schema::{Feature, Value};
use arbor_types::ObjectRef;

use super::cache::SlotCache;
use super::{displaced_slots, forward, slot, FeatureSlot};
use crate::error::StoreResult;
use crate::traits::Store;

type Reads = HashMap<Option<usize>, Option<Value>>;

/// Caches [`Store::get`] results per object, feature and index.
///
/// Any mutation of a feature drops every cached read of that feature once
/// the inner store has applied it.
pub struct FeatureCachingStore {
    inner: Box<dyn Store>,
    cache: SlotCache<Reads>,
}

impl FeatureCachingStore {
    pub fn new(inner: Box<dyn Store>, capacity: usize) -> Self {
        Self {
            inner,
            cache: SlotCache::new(capacity),
        }
    }

    fn write<R>(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        displaced: Vec<FeatureSlot>,
        op: impl FnOnce(&dyn Store) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let write = self.cache.begin(slot(object, feature), displaced);
        let out = op(self.inner.as_ref());
        self.cache.discard(write);
        out
    }
}

impl Store for FeatureCachingStore {
    fn get(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>) -> StoreResult<Option<Value>> {
        let index = if feature.is_many() { index } else { None };
        let key = slot(object, feature);
        let ticket = match self.cache.read(&key, |reads| reads.get(&index).cloned()) {
            Ok(value) => return Ok(value),
            Err(ticket) => ticket,
        };
        let value = self.inner.get(object, feature, index)?;
        self.cache.fill_with(key, ticket, Reads::new, |reads| {
            reads.insert(index, value.clone());
        });
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
        self.write(object, feature, displaced, |inner| inner.set(object, feature, index, value))
    }

    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.write(object, feature, Vec::new(), |inner| inner.unset(object, feature))
    }

    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, std::slice::from_ref(&value))?;
        self.write(object, feature, displaced, |inner| inner.add(object, feature, index, value))
    }

    fn add_all(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        values: Vec<Value>,
    ) -> StoreResult<()> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, &values)?;
        self.write(object, feature, displaced, |inner| inner.add_all(object, feature, index, values))
    }

    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value> {
        self.write(object, feature, Vec::new(), |inner| inner.remove(object, feature, index))
    }

    fn move_value(&self, object: &ObjectRef, feature: &Feature, target: usize, source: usize) -> StoreResult<Value> {
        self.write(object, feature, Vec::new(), |inner| {
            inner.move_value(object, feature, target, source)
        })
    }

    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.write(object, feature, Vec::new(), |inner| inner.clear(object, feature))
    }

    fn close(&self) -> StoreResult<()> {
        self.cache.clear();
        self.inner.close()
    }

    forward!(inner: is_set, size, contains, index_of, last_index_of, to_vec, container_of,
        resolve, update_instance_of, all_instances_of, save, backend, registry);
}
