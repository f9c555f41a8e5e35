use std::sync::Arc;

use arbor_backend::Backend;
use arbor_schema::{Feature, SchemaRegistry, Value};
use arbor_types::{ClassBean, Id, ObjectRef};

use crate::error::StoreResult;

/// Index sentinel for "append at the end" in [`Store::add`] and
/// [`Store::add_all`]; the store does not read the current size first.
pub const NO_INDEX: Option<usize> = None;

/// Feature-level access to stored objects.
///
/// Every call names an object and one of its class's features. Multi-valued
/// features take an index; single-valued features ignore it. A
/// multi-valued feature that was cleared is still set (with size 0); only
/// [`Store::unset`] makes [`Store::is_set`] false again.
///
/// Decorators implement this trait by wrapping another `Store`. Every
/// implementation must keep the exact observable behaviour of the base
/// store for the calls it does not reject.
pub trait Store: Send + Sync {
    /// Read a value. Single-valued features return their default while unset.
    fn get(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>) -> StoreResult<Option<Value>>;

    /// Replace a value and return the previous one.
    fn set(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        value: Value,
    ) -> StoreResult<Option<Value>>;

    fn is_set(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<bool>;

    /// Remove the feature entirely. Idempotent.
    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()>;

    /// Number of values; 0 when unset.
    fn size(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<usize>;

    fn contains(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<bool>;

    fn index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>>;

    fn last_index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>>;

    /// Insert at `index`, or append when `index` is [`NO_INDEX`].
    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()>;

    fn add_all(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        values: Vec<Value>,
    ) -> StoreResult<()>;

    /// Remove and return the value at `index`.
    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value>;

    /// Move the value at `source` to `target`.
    fn move_value(&self, object: &ObjectRef, feature: &Feature, target: usize, source: usize) -> StoreResult<Value>;

    /// Empty a multi-valued feature; it stays set.
    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()>;

    /// Snapshot of every value.
    fn to_vec(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<Vec<Value>>;

    /// The object containing `id` and the containment feature holding it.
    fn container_of(&self, id: Id) -> StoreResult<Option<(ObjectRef, Arc<Feature>)>>;

    /// A lazy handle on a stored object.
    fn resolve(&self, id: Id) -> StoreResult<ObjectRef>;

    /// Record the object's metaclass unless one is already recorded.
    fn update_instance_of(&self, object: &ObjectRef) -> StoreResult<()>;

    /// Every stored instance of `class`; with `strict == false`, of its
    /// concrete subclasses too.
    fn all_instances_of(&self, class: &ClassBean, strict: bool) -> StoreResult<Vec<ObjectRef>>;

    fn save(&self) -> StoreResult<()>;

    fn close(&self) -> StoreResult<()>;

    fn backend(&self) -> Arc<dyn Backend>;

    fn registry(&self) -> Arc<SchemaRegistry>;
}
