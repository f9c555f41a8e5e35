use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use arbor_types::{ClassBean, ContainerDescriptor, Id, ManyFeatureKey, RawValue, SingleFeatureKey};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::{BackendError, BackendResult};
use crate::record::Record;
use crate::traits::Backend;

enum Slot {
    Single(RawValue),
    Many(Vec<RawValue>),
}

#[derive(Default)]
struct Maps {
    containers: HashMap<Id, ContainerDescriptor>,
    instances: HashMap<Id, ClassBean>,
    features: HashMap<SingleFeatureKey, Slot>,
}

impl Maps {
    fn many(&self, key: &SingleFeatureKey) -> Option<&Vec<RawValue>> {
        match self.features.get(key) {
            Some(Slot::Many(values)) => Some(values),
            _ => None,
        }
    }

    /// The collection for `key`, created empty when missing.
    fn many_mut(&mut self, key: &SingleFeatureKey) -> &mut Vec<RawValue> {
        let slot = self
            .features
            .entry(key.clone())
            .or_insert_with(|| Slot::Many(Vec::new()));
        if matches!(*slot, Slot::Single(_)) {
            *slot = Slot::Many(Vec::new());
        }
        match slot {
            Slot::Many(values) => values,
            Slot::Single(_) => unreachable!("slot was just converted"),
        }
    }
}

/// In-memory backend holding unmapped objects.
///
/// Nothing survives `close()`. Closing marks the backend closed at once and
/// releases the maps on a background thread.
pub struct TransientBackend {
    maps: RwLock<Maps>,
    closed: AtomicBool,
}

impl TransientBackend {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
            closed: AtomicBool::new(false),
        }
    }

    fn read(&self) -> BackendResult<RwLockReadGuard<'_, Maps>> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        Ok(self.maps.read())
    }

    fn write(&self) -> BackendResult<RwLockWriteGuard<'_, Maps>> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        Ok(self.maps.write())
    }
}

impl Default for TransientBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransientBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let maps = self.maps.read();
        f.debug_struct("TransientBackend")
            .field("instances", &maps.instances.len())
            .field("features", &maps.features.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn out_of_bounds(index: usize, size: usize) -> BackendError {
    BackendError::IndexOutOfBounds { index, size }
}

impl Backend for TransientBackend {
    fn name(&self) -> String {
        "transient".to_string()
    }

    fn is_persistent(&self) -> bool {
        false
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn container_of(&self, id: Id) -> BackendResult<Option<ContainerDescriptor>> {
        Ok(self.read()?.containers.get(&id).cloned())
    }

    fn container_for(&self, id: Id, container: ContainerDescriptor) -> BackendResult<()> {
        self.write()?.containers.insert(id, container);
        Ok(())
    }

    fn unset_container(&self, id: Id) -> BackendResult<()> {
        self.write()?.containers.remove(&id);
        Ok(())
    }

    fn metaclass_of(&self, id: Id) -> BackendResult<Option<ClassBean>> {
        Ok(self.read()?.instances.get(&id).cloned())
    }

    fn metaclass_for(&self, id: Id, class: &ClassBean) -> BackendResult<bool> {
        let mut maps = self.write()?;
        if maps.instances.contains_key(&id) {
            return Ok(false);
        }
        maps.instances.insert(id, class.clone());
        Ok(true)
    }

    fn all_instances_of(&self, classes: &[ClassBean]) -> BackendResult<Vec<Id>> {
        let maps = self.read()?;
        let mut ids: Vec<Id> = maps
            .instances
            .iter()
            .filter(|(_, class)| classes.contains(class))
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn value_of(&self, key: &SingleFeatureKey) -> BackendResult<Option<RawValue>> {
        Ok(match self.read()?.features.get(key) {
            Some(Slot::Single(v)) => Some(v.clone()),
            _ => None,
        })
    }

    fn value_for(&self, key: &SingleFeatureKey, value: RawValue) -> BackendResult<Option<RawValue>> {
        let previous = self.write()?.features.insert(key.clone(), Slot::Single(value));
        Ok(match previous {
            Some(Slot::Single(v)) => Some(v),
            _ => None,
        })
    }

    fn unset_value(&self, key: &SingleFeatureKey) -> BackendResult<()> {
        self.write()?.features.remove(key);
        Ok(())
    }

    fn has_value(&self, key: &SingleFeatureKey) -> BackendResult<bool> {
        Ok(self.read()?.features.contains_key(key))
    }

    fn value_at(&self, key: &ManyFeatureKey) -> BackendResult<Option<RawValue>> {
        let maps = self.read()?;
        Ok(maps
            .many(&key.feature_key())
            .and_then(|values| values.get(key.position).cloned()))
    }

    fn all_values_of(&self, key: &SingleFeatureKey) -> BackendResult<Vec<RawValue>> {
        Ok(self.read()?.many(key).cloned().unwrap_or_default())
    }

    fn set_value_at(&self, key: &ManyFeatureKey, value: RawValue) -> BackendResult<RawValue> {
        let mut maps = self.write()?;
        let feature_key = key.feature_key();
        let size = maps.many(&feature_key).map_or(0, Vec::len);
        if key.position >= size {
            return Err(out_of_bounds(key.position, size));
        }
        let values = maps.many_mut(&feature_key);
        Ok(std::mem::replace(&mut values[key.position], value))
    }

    fn add_all_values(&self, key: &ManyFeatureKey, values: Vec<RawValue>) -> BackendResult<()> {
        let mut maps = self.write()?;
        let current = maps.many_mut(&key.feature_key());
        if key.position > current.len() {
            return Err(out_of_bounds(key.position, current.len()));
        }
        current.splice(key.position..key.position, values);
        Ok(())
    }

    fn append_all_values(&self, key: &SingleFeatureKey, values: Vec<RawValue>) -> BackendResult<usize> {
        let mut maps = self.write()?;
        let current = maps.many_mut(key);
        let first = current.len();
        current.extend(values);
        Ok(first)
    }

    fn remove_value(&self, key: &ManyFeatureKey) -> BackendResult<RawValue> {
        let mut maps = self.write()?;
        let feature_key = key.feature_key();
        let size = maps.many(&feature_key).map_or(0, Vec::len);
        if key.position >= size {
            return Err(out_of_bounds(key.position, size));
        }
        Ok(maps.many_mut(&feature_key).remove(key.position))
    }

    fn move_value(&self, source: &ManyFeatureKey, target: usize) -> BackendResult<RawValue> {
        let mut maps = self.write()?;
        let feature_key = source.feature_key();
        let size = maps.many(&feature_key).map_or(0, Vec::len);
        if source.position >= size {
            return Err(out_of_bounds(source.position, size));
        }
        if target >= size {
            return Err(out_of_bounds(target, size));
        }
        let values = maps.many_mut(&feature_key);
        let value = values.remove(source.position);
        values.insert(target, value.clone());
        Ok(value)
    }

    fn clear_values(&self, key: &SingleFeatureKey) -> BackendResult<()> {
        self.write()?.many_mut(key).clear();
        Ok(())
    }

    fn size_of(&self, key: &SingleFeatureKey) -> BackendResult<Option<usize>> {
        Ok(self.read()?.many(key).map(Vec::len))
    }

    fn save(&self) -> BackendResult<()> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    fn close(&self) -> BackendResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let maps = std::mem::take(&mut *self.maps.write());
        std::thread::spawn(move || {
            let released = maps.features.len();
            drop(maps);
            debug!(released, "transient backend maps released");
        });
        Ok(())
    }

    fn records(&self) -> BackendResult<Vec<Record>> {
        let maps = self.read()?;
        let mut records = Vec::with_capacity(
            maps.containers.len() + maps.instances.len() + maps.features.len(),
        );
        for (id, class) in &maps.instances {
            records.push(Record::Metaclass {
                id: *id,
                class: class.clone(),
            });
        }
        for (id, container) in &maps.containers {
            records.push(Record::Container {
                id: *id,
                container: container.clone(),
            });
        }
        for (key, slot) in &maps.features {
            records.push(match slot {
                Slot::Single(value) => Record::Value {
                    key: key.clone(),
                    value: value.clone(),
                },
                Slot::Many(values) => Record::Values {
                    key: key.clone(),
                    values: values.clone(),
                },
            });
        }
        Ok(records)
    }
}
