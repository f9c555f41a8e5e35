//! Store decorators.
//!
//! Each decorator owns the next store in the chain and implements
//! [`Store`](crate::Store) itself. Methods it does not intercept are
//! delegated unchanged with [`forward!`].

mod auto_save;
mod cache;
mod count;
mod feature;
mod is_set;
mod log;
mod read_only;
mod size;

pub use auto_save::{AutoSaveStore, DEFAULT_SAVE_CHUNK};
pub use count::{LoadedObjectCounterStore, LoadedObjects};
pub use feature::FeatureCachingStore;
pub use is_set::IsSetCachingStore;
pub use log::LoggingStore;
pub use read_only::ReadOnlyStore;
pub use size::SizeCachingStore;

/// Cache key shared by the per-feature caches.
pub(crate) type FeatureSlot = (arbor_types::Id, String);

pub(crate) fn slot(object: &arbor_types::ObjectRef, feature: &arbor_schema::Feature) -> FeatureSlot {
    (object.id(), feature.name().to_string())
}

/// Slots a write of `values` into a containment feature empties as a side
/// effect: containing an object removes it from the slot that held it.
pub(crate) fn displaced_slots(
    inner: &dyn crate::traits::Store,
    feature: &arbor_schema::Feature,
    values: &[arbor_schema::Value],
) -> crate::error::StoreResult<Vec<FeatureSlot>> {
    let mut slots = Vec::new();
    if !feature.is_containment() {
        return Ok(slots);
    }
    let backend = inner.backend();
    for value in values {
        if let arbor_schema::Value::Object(child) = value {
            if let Some(held) = backend.container_of(child.id())? {
                let old = (held.container, held.feature);
                if !slots.contains(&old) {
                    slots.push(old);
                }
            }
        }
    }
    Ok(slots)
}

/// Delegate `Store` methods to `self.$field` unchanged.
///
/// `forward!(inner: get, set, save)` expands to the three methods.
macro_rules! forward {
    ($f:ident: get) => {
        fn get(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            index: Option<usize>,
        ) -> $crate::error::StoreResult<Option<::arbor_schema::Value>> {
            self.$f.get(object, feature, index)
        }
    };
    ($f:ident: set) => {
        fn set(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            index: Option<usize>,
            value: ::arbor_schema::Value,
        ) -> $crate::error::StoreResult<Option<::arbor_schema::Value>> {
            self.$f.set(object, feature, index, value)
        }
    };
    ($f:ident: is_set) => {
        fn is_set(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
        ) -> $crate::error::StoreResult<bool> {
            self.$f.is_set(object, feature)
        }
    };
    ($f:ident: unset) => {
        fn unset(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
        ) -> $crate::error::StoreResult<()> {
            self.$f.unset(object, feature)
        }
    };
    ($f:ident: size) => {
        fn size(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
        ) -> $crate::error::StoreResult<usize> {
            self.$f.size(object, feature)
        }
    };
    ($f:ident: contains) => {
        fn contains(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            value: &::arbor_schema::Value,
        ) -> $crate::error::StoreResult<bool> {
            self.$f.contains(object, feature, value)
        }
    };
    ($f:ident: index_of) => {
        fn index_of(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            value: &::arbor_schema::Value,
        ) -> $crate::error::StoreResult<Option<usize>> {
            self.$f.index_of(object, feature, value)
        }
    };
    ($f:ident: last_index_of) => {
        fn last_index_of(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            value: &::arbor_schema::Value,
        ) -> $crate::error::StoreResult<Option<usize>> {
            self.$f.last_index_of(object, feature, value)
        }
    };
    ($f:ident: add) => {
        fn add(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            index: Option<usize>,
            value: ::arbor_schema::Value,
        ) -> $crate::error::StoreResult<()> {
            self.$f.add(object, feature, index, value)
        }
    };
    ($f:ident: add_all) => {
        fn add_all(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            index: Option<usize>,
            values: Vec<::arbor_schema::Value>,
        ) -> $crate::error::StoreResult<()> {
            self.$f.add_all(object, feature, index, values)
        }
    };
    ($f:ident: remove) => {
        fn remove(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            index: usize,
        ) -> $crate::error::StoreResult<::arbor_schema::Value> {
            self.$f.remove(object, feature, index)
        }
    };
    ($f:ident: move_value) => {
        fn move_value(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
            target: usize,
            source: usize,
        ) -> $crate::error::StoreResult<::arbor_schema::Value> {
            self.$f.move_value(object, feature, target, source)
        }
    };
    ($f:ident: clear) => {
        fn clear(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
        ) -> $crate::error::StoreResult<()> {
            self.$f.clear(object, feature)
        }
    };
    ($f:ident: to_vec) => {
        fn to_vec(
            &self,
            object: &::arbor_types::ObjectRef,
            feature: &::arbor_schema::Feature,
        ) -> $crate::error::StoreResult<Vec<::arbor_schema::Value>> {
            self.$f.to_vec(object, feature)
        }
    };
    ($f:ident: container_of) => {
        fn container_of(
            &self,
            id: ::arbor_types::Id,
        ) -> $crate::error::StoreResult<
            Option<(::arbor_types::ObjectRef, ::std::sync::Arc<::arbor_schema::Feature>)>,
        > {
            self.$f.container_of(id)
        }
    };
    ($f:ident: resolve) => {
        fn resolve(&self, id: ::arbor_types::Id) -> $crate::error::StoreResult<::arbor_types::ObjectRef> {
            self.$f.resolve(id)
        }
    };
    ($f:ident: update_instance_of) => {
        fn update_instance_of(&self, object: &::arbor_types::ObjectRef) -> $crate::error::StoreResult<()> {
            self.$f.update_instance_of(object)
        }
    };
    ($f:ident: all_instances_of) => {
        fn all_instances_of(
            &self,
            class: &::arbor_types::ClassBean,
            strict: bool,
        ) -> $crate::error::StoreResult<Vec<::arbor_types::ObjectRef>> {
            self.$f.all_instances_of(class, strict)
        }
    };
    ($f:ident: save) => {
        fn save(&self) -> $crate::error::StoreResult<()> {
            self.$f.save()
        }
    };
    ($f:ident: close) => {
        fn close(&self) -> $crate::error::StoreResult<()> {
            self.$f.close()
        }
    };
    ($f:ident: backend) => {
        fn backend(&self) -> ::std::sync::Arc<dyn ::arbor_backend::Backend> {
            self.$f.backend()
        }
    };
    ($f:ident: registry) => {
        fn registry(&self) -> ::std::sync::Arc<::arbor_schema::SchemaRegistry> {
            self.$f.registry()
        }
    };
    ($f:ident: $($method:ident),+ $(,)?) => {
        $( forward!($f: $method); )+
    };
}

pub(crate) use forward;
