use std::sync::atomic::{AtomicUsize, Ordering};

use arbor_schema::{Feature, Value};
use arbor_types::ObjectRef;
use tracing::debug;

use super::forward;
use crate::error::StoreResult;
use crate::traits::Store;

/// Mutations between two automatic saves when no chunk is given.
pub const DEFAULT_SAVE_CHUNK: usize = 50_000;

/// Saves the store after every `chunk` mutations, and once more on close.
pub struct AutoSaveStore {
    inner: Box<dyn Store>,
    chunk: usize,
    pending: AtomicUsize,
}

impl AutoSaveStore {
    pub fn new(inner: Box<dyn Store>, chunk: usize) -> Self {
        Self {
            inner,
            chunk: chunk.max(1),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn count<T>(&self, result: StoreResult<T>, changes: usize) -> StoreResult<T> {
        let value = result?;
        self.pending.fetch_add(changes, Ordering::AcqRel);
        // Claim whole chunks only; changes counted by other threads stay pending.
        let chunk = self.chunk;
        let claimed = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                (pending >= chunk).then_some(pending % chunk)
            });
        if let Ok(pending) = claimed {
            debug!(pending, "auto-save");
            self.inner.save()?;
        }
        Ok(value)
    }
}

impl Store for AutoSaveStore {
    fn set(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        value: Value,
    ) -> StoreResult<Option<Value>> {
        self.count(self.inner.set(object, feature, index, value), 1)
    }

    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.count(self.inner.unset(object, feature), 1)
    }

    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()> {
        self.count(self.inner.add(object, feature, index, value), 1)
    }

    fn add_all(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        values: Vec<Value>,
    ) -> StoreResult<()> {
        let changes = values.len();
        self.count(self.inner.add_all(object, feature, index, values), changes)
    }

    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value> {
        self.count(self.inner.remove(object, feature, index), 1)
    }

    fn move_value(&self, object: &ObjectRef, feature: &Feature, target: usize, source: usize) -> StoreResult<Value> {
        self.count(self.inner.move_value(object, feature, target, source), 1)
    }

    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.count(self.inner.clear(object, feature), 1)
    }

    fn save(&self) -> StoreResult<()> {
        self.pending.store(0, Ordering::Release);
        self.inner.save()
    }

    fn close(&self) -> StoreResult<()> {
        if !self.inner.backend().is_closed() {
            self.save()?;
        }
        self.inner.close()
    }

    forward!(inner: get, is_set, size, contains, index_of, last_index_of, to_vec,
        container_of, resolve, update_instance_of, all_instances_of, backend, registry);
}
