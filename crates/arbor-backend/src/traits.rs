use arbor_types::{ClassBean, ContainerDescriptor, Id, ManyFeatureKey, RawValue, SingleFeatureKey};

use crate::error::{BackendError, BackendResult};
use crate::record::Record;

/// The contract a storage engine has to satisfy.
///
/// Implementations must be safe to share across threads. Operations on
/// independent keys may run concurrently; operations on the same
/// multi-valued feature must observe each other atomically, so a reader
/// never sees a half-shifted sequence.
///
/// Positions are dense: a multi-valued feature of size `n` has exactly the
/// slots `0..n`. A multi-valued feature that was cleared is still set, with
/// size 0; only [`Backend::unset_value`] removes it.
pub trait Backend: Send + Sync {
    /// Short description of the backend, used in logs.
    fn name(&self) -> String;

    /// Whether data survives `close()`.
    fn is_persistent(&self) -> bool;

    fn is_closed(&self) -> bool;

    // -----------------------------------------------------------------------
    // Containers
    // -----------------------------------------------------------------------

    fn container_of(&self, id: Id) -> BackendResult<Option<ContainerDescriptor>>;

    fn container_for(&self, id: Id, container: ContainerDescriptor) -> BackendResult<()>;

    fn unset_container(&self, id: Id) -> BackendResult<()>;

    // -----------------------------------------------------------------------
    // Metaclasses
    // -----------------------------------------------------------------------

    fn metaclass_of(&self, id: Id) -> BackendResult<Option<ClassBean>>;

    /// Record the metaclass of `id` unless one is already recorded.
    ///
    /// Returns `true` when the record was written and `false` when an
    /// existing metaclass was kept.
    fn metaclass_for(&self, id: Id, class: &ClassBean) -> BackendResult<bool>;

    /// Ids of every object whose metaclass is one of `classes`.
    ///
    /// Backends without an efficient scan return
    /// [`BackendError::Unsupported`], which callers are expected to handle.
    fn all_instances_of(&self, classes: &[ClassBean]) -> BackendResult<Vec<Id>> {
        let _ = classes;
        Err(BackendError::unsupported("all_instances_of"))
    }

    // -----------------------------------------------------------------------
    // Single-valued features
    // -----------------------------------------------------------------------

    fn value_of(&self, key: &SingleFeatureKey) -> BackendResult<Option<RawValue>>;

    /// Store `value` and return the previous one.
    fn value_for(&self, key: &SingleFeatureKey, value: RawValue) -> BackendResult<Option<RawValue>>;

    /// Remove the feature entirely, single- or multi-valued. Idempotent.
    fn unset_value(&self, key: &SingleFeatureKey) -> BackendResult<()>;

    /// Whether the feature holds a value or a (possibly empty) collection.
    fn has_value(&self, key: &SingleFeatureKey) -> BackendResult<bool>;

    // -----------------------------------------------------------------------
    // Multi-valued features
    // -----------------------------------------------------------------------

    fn value_at(&self, key: &ManyFeatureKey) -> BackendResult<Option<RawValue>>;

    fn all_values_of(&self, key: &SingleFeatureKey) -> BackendResult<Vec<RawValue>>;

    /// Replace slot `key.position`; fails if the slot does not exist.
    fn set_value_at(&self, key: &ManyFeatureKey, value: RawValue) -> BackendResult<RawValue>;

    /// Insert at `key.position`, shifting later slots up. `position` may equal the size.
    fn add_value(&self, key: &ManyFeatureKey, value: RawValue) -> BackendResult<()> {
        self.add_all_values(key, vec![value])
    }

    /// Insert a run of values starting at `key.position`.
    fn add_all_values(&self, key: &ManyFeatureKey, values: Vec<RawValue>) -> BackendResult<()>;

    /// Append at the end; returns the position the value landed at.
    fn append_value(&self, key: &SingleFeatureKey, value: RawValue) -> BackendResult<usize> {
        self.append_all_values(key, vec![value])
    }

    /// Append a run of values; returns the position of the first one.
    fn append_all_values(&self, key: &SingleFeatureKey, values: Vec<RawValue>) -> BackendResult<usize>;

    /// Remove slot `key.position`, shifting later slots down.
    fn remove_value(&self, key: &ManyFeatureKey) -> BackendResult<RawValue>;

    /// Move the value at `source.position` to `target`, keeping the
    /// relative order of every other slot.
    fn move_value(&self, source: &ManyFeatureKey, target: usize) -> BackendResult<RawValue>;

    /// Empty the collection, leaving it set with size 0.
    fn clear_values(&self, key: &SingleFeatureKey) -> BackendResult<()>;

    /// Size of the collection, or `None` if it was never set.
    fn size_of(&self, key: &SingleFeatureKey) -> BackendResult<Option<usize>>;

    fn index_of_value(&self, key: &SingleFeatureKey, value: &RawValue) -> BackendResult<Option<usize>> {
        Ok(self.all_values_of(key)?.iter().position(|v| v == value))
    }

    fn last_index_of_value(
        &self,
        key: &SingleFeatureKey,
        value: &RawValue,
    ) -> BackendResult<Option<usize>> {
        Ok(self.all_values_of(key)?.iter().rposition(|v| v == value))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Make every write so far durable. A no-op for in-memory backends.
    fn save(&self) -> BackendResult<()>;

    /// Close the backend. Calling it again is a no-op.
    fn close(&self) -> BackendResult<()>;

    /// Every stored record, independent of the internal mapping.
    fn records(&self) -> BackendResult<Vec<Record>>;

    /// Duplicate every record into `target`.
    fn copy_to(&self, target: &dyn Backend) -> BackendResult<()> {
        for record in self.records()? {
            record.apply(target)?;
        }
        target.save()
    }
}
