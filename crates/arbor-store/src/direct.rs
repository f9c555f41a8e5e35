use std::num::NonZeroUsize;
use std::sync::Arc;

use arbor_backend::Backend;
use arbor_schema::{Feature, FeatureKind, SchemaRegistry, Value};
use arbor_types::{ClassBean, ContainerDescriptor, Id, ObjectRef, RawValue, SingleFeatureKey};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

/// Default number of metaclasses kept by the resolution cache.
pub const DEFAULT_CLASS_CACHE: usize = 10_000;

/// The base store: maps feature operations straight onto a backend.
///
/// Containment is kept consistent by construction. Before a child is linked
/// into a containment slot its container descriptor and metaclass are
/// written; when a child leaves a slot its container descriptor is cleared.
/// A crash between the two steps leaves an orphan, never a dangling link.
pub struct DirectStore {
    backend: Arc<dyn Backend>,
    registry: Arc<SchemaRegistry>,
    classes: Mutex<LruCache<Id, ClassBean>>,
}

impl DirectStore {
    pub fn new(backend: Arc<dyn Backend>, registry: Arc<SchemaRegistry>) -> Self {
        Self::with_class_cache(backend, registry, DEFAULT_CLASS_CACHE)
    }

    pub fn with_class_cache(
        backend: Arc<dyn Backend>,
        registry: Arc<SchemaRegistry>,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            registry,
            classes: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Check that `feature` belongs to the object's class and build its key.
    fn key(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<SingleFeatureKey> {
        let class = self.registry.class(object.class())?;
        if !class.owns(feature) {
            return Err(StoreError::InvalidFeature {
                class: object.class().to_string(),
                feature: feature.name().to_string(),
            });
        }
        Ok(SingleFeatureKey::new(object.id(), feature.name()))
    }

    fn many_key(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<SingleFeatureKey> {
        let key = self.key(object, feature)?;
        if !feature.is_many() {
            return Err(StoreError::InvalidArgument(format!(
                "'{}' is single-valued",
                feature.name()
            )));
        }
        Ok(key)
    }

    fn to_raw(&self, feature: &Feature, value: &Value) -> StoreResult<RawValue> {
        match (feature.kind(), value) {
            (FeatureKind::Attribute(data_type), value) => data_type
                .to_literal(value)
                .map(RawValue::Literal)
                .map_err(|e| StoreError::InvalidValue(format!("{}: {e}", feature.name()))),
            (FeatureKind::Reference { target, .. }, Value::Object(object)) => {
                if !self.registry.is_super_type_of(target, object.class()) {
                    return Err(StoreError::InvalidValue(format!(
                        "{}: {} is not a {}",
                        feature.name(),
                        object.class(),
                        target
                    )));
                }
                Ok(RawValue::Reference(object.id()))
            }
            (FeatureKind::Reference { .. }, other) => Err(StoreError::InvalidValue(format!(
                "{}: expected an object, found {}",
                feature.name(),
                other.kind()
            ))),
        }
    }

    fn from_raw(&self, feature: &Feature, raw: RawValue) -> StoreResult<Value> {
        match (feature.kind(), raw) {
            (FeatureKind::Attribute(data_type), RawValue::Literal(literal)) => {
                Ok(data_type.parse(&literal)?)
            }
            (FeatureKind::Reference { .. }, RawValue::Reference(id)) => {
                Ok(Value::Object(self.resolve(id)?))
            }
            (_, raw) => Err(StoreError::InvalidValue(format!(
                "{}: stored value {raw:?} does not match the feature",
                feature.name()
            ))),
        }
    }

    fn default_value(&self, feature: &Feature) -> StoreResult<Option<Value>> {
        match (feature.data_type(), feature.default_literal()) {
            (Some(data_type), Some(literal)) => Ok(Some(data_type.parse(literal)?)),
            _ => Ok(None),
        }
    }

    /// Make `value` a child of `(owner, feature)` if the feature is a containment.
    ///
    /// A child held by another slot is first removed from it, so that at
    /// most one slot ever holds an object. The owner's metaclass is recorded
    /// so the container can be resolved later. Always records the metaclass
    /// of referenced objects.
    fn adopt(
        &self,
        object: &ObjectRef,
        owner: &SingleFeatureKey,
        feature: &Feature,
        value: &Value,
    ) -> StoreResult<()> {
        let Value::Object(child) = value else {
            return Ok(());
        };
        if feature.is_containment() {
            let descriptor = ContainerDescriptor::new(owner.owner, owner.feature.clone());
            if let Some(current) = self.backend.container_of(child.id())? {
                if current != descriptor {
                    self.detach(child.id(), &current)?;
                }
            }
            self.update_instance_of(object)?;
            self.backend.container_for(child.id(), descriptor)?;
        }
        self.update_instance_of(child)
    }

    /// Remove `child` from the slot described by `from`.
    fn detach(&self, child: Id, from: &ContainerDescriptor) -> StoreResult<()> {
        let owner = self.resolve(from.container)?;
        let feature = self.registry.feature(owner.class(), &from.feature)?;
        let key = SingleFeatureKey::new(from.container, from.feature.clone());
        let raw = RawValue::Reference(child);
        if feature.is_many() {
            if let Some(index) = self.backend.index_of_value(&key, &raw)? {
                self.backend.remove_value(&key.at(index))?;
            }
        } else if self.backend.value_of(&key)? == Some(raw) {
            self.backend.unset_value(&key)?;
        }
        trace!(child = %child, container = %from.container, feature = %from.feature, "child moved out");
        Ok(())
    }

    /// Reject containment values already held by `key`, or repeated in `raws`.
    fn check_unique(&self, key: &SingleFeatureKey, feature: &Feature, raws: &[RawValue]) -> StoreResult<()> {
        if !feature.is_containment() {
            return Ok(());
        }
        for (i, raw) in raws.iter().enumerate() {
            if raws[..i].contains(raw) || self.backend.index_of_value(key, raw)?.is_some() {
                return Err(StoreError::InvalidValue(format!(
                    "{}: {raw:?} is already contained",
                    feature.name()
                )));
            }
        }
        Ok(())
    }

    /// Clear the container of a child leaving `(owner, feature)`.
    fn release(&self, owner: &SingleFeatureKey, feature: &Feature, raw: &RawValue) -> StoreResult<()> {
        if !feature.is_containment() {
            return Ok(());
        }
        let Some(child) = raw.as_reference() else {
            return Ok(());
        };
        let expected = ContainerDescriptor::new(owner.owner, owner.feature.clone());
        if self.backend.container_of(child)?.as_ref() == Some(&expected) {
            self.backend.unset_container(child)?;
        }
        Ok(())
    }

    fn release_all(&self, key: &SingleFeatureKey, feature: &Feature) -> StoreResult<()> {
        if !feature.is_containment() {
            return Ok(());
        }
        if feature.is_many() {
            for raw in self.backend.all_values_of(key)? {
                self.release(key, feature, &raw)?;
            }
        } else if let Some(raw) = self.backend.value_of(key)? {
            self.release(key, feature, &raw)?;
        }
        Ok(())
    }

    fn check_insert(&self, key: &SingleFeatureKey, index: Option<usize>) -> StoreResult<()> {
        if let Some(index) = index {
            let size = self.backend.size_of(key)?.unwrap_or(0);
            if index > size {
                return Err(StoreError::IndexOutOfBounds { index, size });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DirectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectStore")
            .field("backend", &self.backend.name())
            .field("cached_classes", &self.classes.lock().len())
            .finish()
    }
}

fn require_index(feature: &Feature, index: Option<usize>) -> StoreResult<usize> {
    index.ok_or_else(|| {
        StoreError::InvalidArgument(format!("'{}' is multi-valued; an index is required", feature.name()))
    })
}

impl Store for DirectStore {
    fn get(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>) -> StoreResult<Option<Value>> {
        let key = self.key(object, feature)?;
        if !feature.is_many() {
            return match self.backend.value_of(&key)? {
                Some(raw) => self.from_raw(feature, raw).map(Some),
                None => self.default_value(feature),
            };
        }
        let index = require_index(feature, index)?;
        match self.backend.value_at(&key.at(index))? {
            Some(raw) => self.from_raw(feature, raw).map(Some),
            None => Err(StoreError::IndexOutOfBounds {
                index,
                size: self.backend.size_of(&key)?.unwrap_or(0),
            }),
        }
    }

    fn set(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        value: Value,
    ) -> StoreResult<Option<Value>> {
        let key = self.key(object, feature)?;
        let raw = self.to_raw(feature, &value)?;

        if !feature.is_many() {
            if feature.is_containment() {
                if let Some(old) = self.backend.value_of(&key)? {
                    if old != raw {
                        self.release(&key, feature, &old)?;
                    }
                }
            }
            self.adopt(object, &key, feature, &value)?;
            let previous = self.backend.value_for(&key, raw)?;
            return previous.map(|p| self.from_raw(feature, p)).transpose();
        }

        let index = require_index(feature, index)?;
        let slot = key.at(index);
        let Some(old) = self.backend.value_at(&slot)? else {
            return Err(StoreError::IndexOutOfBounds {
                index,
                size: self.backend.size_of(&key)?.unwrap_or(0),
            });
        };
        if old != raw {
            self.check_unique(&key, feature, std::slice::from_ref(&raw))?;
            self.release(&key, feature, &old)?;
            self.adopt(object, &key, feature, &value)?;
        }
        let previous = self.backend.set_value_at(&slot, raw)?;
        self.from_raw(feature, previous).map(Some)
    }

    fn is_set(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<bool> {
        let key = self.key(object, feature)?;
        Ok(self.backend.has_value(&key)?)
    }

    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        let key = self.key(object, feature)?;
        self.release_all(&key, feature)?;
        Ok(self.backend.unset_value(&key)?)
    }

    fn size(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<usize> {
        let key = self.key(object, feature)?;
        if feature.is_many() {
            Ok(self.backend.size_of(&key)?.unwrap_or(0))
        } else {
            Ok(usize::from(self.backend.value_of(&key)?.is_some()))
        }
    }

    fn contains(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<bool> {
        Ok(self.index_of(object, feature, value)?.is_some())
    }

    fn index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>> {
        let key = self.key(object, feature)?;
        let Ok(raw) = self.to_raw(feature, value) else {
            return Ok(None);
        };
        if feature.is_many() {
            Ok(self.backend.index_of_value(&key, &raw)?)
        } else {
            Ok((self.backend.value_of(&key)? == Some(raw)).then_some(0))
        }
    }

    fn last_index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>> {
        let key = self.key(object, feature)?;
        let Ok(raw) = self.to_raw(feature, value) else {
            return Ok(None);
        };
        if feature.is_many() {
            Ok(self.backend.last_index_of_value(&key, &raw)?)
        } else {
            Ok((self.backend.value_of(&key)? == Some(raw)).then_some(0))
        }
    }

    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()> {
        let key = self.many_key(object, feature)?;
        let raw = self.to_raw(feature, &value)?;
        self.check_insert(&key, index)?;
        self.check_unique(&key, feature, std::slice::from_ref(&raw))?;
        self.adopt(object, &key, feature, &value)?;
        match index {
            Some(index) => self.backend.add_value(&key.at(index), raw)?,
            None => {
                self.backend.append_value(&key, raw)?;
            }
        }
        Ok(())
    }

    fn add_all(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        values: Vec<Value>,
    ) -> StoreResult<()> {
        let key = self.many_key(object, feature)?;
        let raws = values
            .iter()
            .map(|v| self.to_raw(feature, v))
            .collect::<StoreResult<Vec<_>>>()?;
        self.check_insert(&key, index)?;
        self.check_unique(&key, feature, &raws)?;
        for value in &values {
            self.adopt(object, &key, feature, value)?;
        }
        match index {
            Some(index) => self.backend.add_all_values(&key.at(index), raws)?,
            None => {
                self.backend.append_all_values(&key, raws)?;
            }
        }
        Ok(())
    }

    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value> {
        let key = self.many_key(object, feature)?;
        let removed = self.backend.remove_value(&key.at(index))?;
        self.release(&key, feature, &removed)?;
        self.from_raw(feature, removed)
    }

    fn move_value(&self, object: &ObjectRef, feature: &Feature, target: usize, source: usize) -> StoreResult<Value> {
        let key = self.many_key(object, feature)?;
        let moved = self.backend.move_value(&key.at(source), target)?;
        self.from_raw(feature, moved)
    }

    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        if !feature.is_many() {
            return self.unset(object, feature);
        }
        let key = self.key(object, feature)?;
        self.release_all(&key, feature)?;
        Ok(self.backend.clear_values(&key)?)
    }

    fn to_vec(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<Vec<Value>> {
        let key = self.key(object, feature)?;
        let raws = if feature.is_many() {
            self.backend.all_values_of(&key)?
        } else {
            self.backend.value_of(&key)?.into_iter().collect()
        };
        raws.into_iter().map(|raw| self.from_raw(feature, raw)).collect()
    }

    fn container_of(&self, id: Id) -> StoreResult<Option<(ObjectRef, Arc<Feature>)>> {
        let Some(descriptor) = self.backend.container_of(id)? else {
            return Ok(None);
        };
        let container = self.resolve(descriptor.container)?;
        let feature = self.registry.feature(container.class(), &descriptor.feature)?;
        Ok(Some((container, feature)))
    }

    fn resolve(&self, id: Id) -> StoreResult<ObjectRef> {
        if let Some(class) = self.classes.lock().get(&id) {
            return Ok(ObjectRef::new(id, class.clone()));
        }
        let class = self
            .backend
            .metaclass_of(id)?
            .ok_or(StoreError::UnknownObject(id))?;
        trace!(id = %id, class = %class, "metaclass resolved");
        self.classes.lock().put(id, class.clone());
        Ok(ObjectRef::new(id, class))
    }

    fn update_instance_of(&self, object: &ObjectRef) -> StoreResult<()> {
        if self.classes.lock().contains(&object.id()) {
            return Ok(());
        }
        if self.backend.metaclass_for(object.id(), object.class())? {
            self.classes.lock().put(object.id(), object.class().clone());
        }
        Ok(())
    }

    fn all_instances_of(&self, class: &ClassBean, strict: bool) -> StoreResult<Vec<ObjectRef>> {
        let classes = if strict {
            vec![class.clone()]
        } else {
            self.registry.concrete_subclasses(class)
        };
        let mut found = Vec::new();
        for candidate in classes {
            for id in self.backend.all_instances_of(std::slice::from_ref(&candidate))? {
                found.push(ObjectRef::new(id, candidate.clone()));
            }
        }
        Ok(found)
    }

    fn save(&self) -> StoreResult<()> {
        Ok(self.backend.save()?)
    }

    fn close(&self) -> StoreResult<()> {
        self.classes.lock().clear();
        Ok(self.backend.close()?)
    }

    fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    fn registry(&self) -> Arc<SchemaRegistry> {
        self.registry.clone()
    }
}
