use arbor_schema::{Feature, Value};
use arbor_types::ObjectRef;

use super::cache::SlotCache;
use super::{displaced_slots, forward, slot, FeatureSlot};
use crate::error::StoreResult;
use crate::traits::Store;

/// What a successful mutation does to a cached size.
enum Resize {
    By(isize),
    To(usize),
}

/// Caches [`Store::size`] for multi-valued features.
///
/// Cached sizes are adjusted in place by successful insertions and
/// removals. Single-valued features are never cached.
pub struct SizeCachingStore {
    inner: Box<dyn Store>,
    cache: SlotCache<usize>,
}

impl SizeCachingStore {
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
        resize: Resize,
        op: impl FnOnce(&dyn Store) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let write = self.cache.begin(slot(object, feature), displaced);
        match op(self.inner.as_ref()) {
            Ok(out) => {
                let many = feature.is_many();
                self.cache.finish(write, |entries, target| match resize {
                    Resize::By(delta) => {
                        if let Some(size) = entries.get_mut(&target) {
                            *size = size.saturating_add_signed(delta);
                        }
                    }
                    Resize::To(size) if many => {
                        entries.put(target, size);
                    }
                    Resize::To(_) => {}
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

impl Store for SizeCachingStore {
    fn size(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<usize> {
        if !feature.is_many() {
            return self.inner.size(object, feature);
        }
        let key = slot(object, feature);
        let ticket = match self.cache.read(&key, |size| Some(*size)) {
            Ok(size) => return Ok(size),
            Err(ticket) => ticket,
        };
        let size = self.inner.size(object, feature)?;
        self.cache.fill(key, ticket, size);
        Ok(size)
    }

    fn set(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        value: Value,
    ) -> StoreResult<Option<Value>> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, std::slice::from_ref(&value))?;
        self.write(object, feature, displaced, Resize::By(0), |inner| {
            inner.set(object, feature, index, value)
        })
    }

    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.write(object, feature, Vec::new(), Resize::To(0), |inner| {
            inner.unset(object, feature)
        })
    }

    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()> {
        let displaced = displaced_slots(self.inner.as_ref(), feature, std::slice::from_ref(&value))?;
        self.write(object, feature, displaced, Resize::By(1), |inner| {
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
        let added = values.len() as isize;
        let displaced = displaced_slots(self.inner.as_ref(), feature, &values)?;
        self.write(object, feature, displaced, Resize::By(added), |inner| {
            inner.add_all(object, feature, index, values)
        })
    }

    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value> {
        self.write(object, feature, Vec::new(), Resize::By(-1), |inner| {
            inner.remove(object, feature, index)
        })
    }

    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.write(object, feature, Vec::new(), Resize::To(0), |inner| {
            inner.clear(object, feature)
        })
    }

    fn to_vec(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<Vec<Value>> {
        let ticket = self.cache.ticket();
        let values = self.inner.to_vec(object, feature)?;
        if feature.is_many() {
            self.cache.fill(slot(object, feature), ticket, values.len());
        }
        Ok(values)
    }

    fn close(&self) -> StoreResult<()> {
        self.cache.clear();
        self.inner.close()
    }

    forward!(inner: get, is_set, contains, index_of, last_index_of, move_value,
        container_of, resolve, update_instance_of, all_instances_of, save, backend, registry);
}
