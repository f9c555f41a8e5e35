use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use arbor_types::{ClassBean, ContainerDescriptor, Id, ManyFeatureKey, RawValue, SingleFeatureKey};
use parking_lot::RwLock;
use tracing::debug;

use crate::codec::{self, StorageKey, COLLECTION, CONTAINER, METACLASS, SIZE, VALUE};
use crate::config::ManyMapping;
use crate::engine::KvEngine;
use crate::error::{BackendError, BackendResult};
use crate::record::Record;
use crate::traits::Backend;

/// Number of lock stripes guarding multi-valued features.
const STRIPES: usize = 64;

/// Backend laying the object model out on a key-value engine.
///
/// Every mutation of one (owner, feature) pair runs under the write side of
/// a striped lock and every read of it under the read side, so readers never
/// observe a collection half way through a shift.
pub struct MappedBackend<E> {
    engine: E,
    mapping: ManyMapping,
    stripes: Box<[RwLock<()>]>,
    closed: AtomicBool,
}

impl<E: KvEngine> MappedBackend<E> {
    pub fn new(engine: E, mapping: ManyMapping) -> Self {
        Self {
            engine,
            mapping,
            stripes: (0..STRIPES).map(|_| RwLock::new(())).collect(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn mapping(&self) -> ManyMapping {
        self.mapping
    }

    fn check_open(&self) -> BackendResult<()> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    fn stripe<K: Hash>(&self, key: &K) -> &RwLock<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    // -----------------------------------------------------------------------
    // Collection primitives; callers hold the stripe lock
    // -----------------------------------------------------------------------

    fn read_slot(&self, key: &ManyFeatureKey) -> BackendResult<Option<RawValue>> {
        self.engine
            .get(&codec::slot_key(key))?
            .map(|b| codec::decode(&b))
            .transpose()
    }

    fn write_slot(&self, key: &ManyFeatureKey, value: &RawValue) -> BackendResult<()> {
        self.engine.put(&codec::slot_key(key), &codec::encode(value)?)
    }

    fn copy_slot(&self, key: &SingleFeatureKey, from: usize, to: usize) -> BackendResult<()> {
        let value = self.read_slot(&key.at(from))?.ok_or_else(|| missing_slot(key, from))?;
        self.write_slot(&key.at(to), &value)
    }

    fn write_size(&self, key: &SingleFeatureKey, size: usize) -> BackendResult<()> {
        self.engine
            .put(&codec::feature_key(SIZE, key), &codec::encode(&(size as u64))?)
    }

    fn read_size(&self, key: &SingleFeatureKey) -> BackendResult<Option<usize>> {
        match self.mapping {
            ManyMapping::Indices => self
                .engine
                .get(&codec::feature_key(SIZE, key))?
                .map(|b| codec::decode::<u64>(&b).map(|n| n as usize))
                .transpose(),
            ManyMapping::Lists => Ok(self.read_list(key)?.map(|values| values.len())),
            ManyMapping::Arrays => self
                .engine
                .get(&codec::feature_key(COLLECTION, key))?
                .map(|b| codec::array_len(&b))
                .transpose(),
        }
    }

    fn read_list(&self, key: &SingleFeatureKey) -> BackendResult<Option<Vec<RawValue>>> {
        match self.mapping {
            ManyMapping::Indices => {
                let Some(size) = self.read_size(key)? else {
                    return Ok(None);
                };
                (0..size)
                    .map(|i| self.read_slot(&key.at(i))?.ok_or_else(|| missing_slot(key, i)))
                    .collect::<BackendResult<Vec<_>>>()
                    .map(Some)
            }
            ManyMapping::Lists => self
                .engine
                .get(&codec::feature_key(COLLECTION, key))?
                .map(|b| codec::decode(&b))
                .transpose(),
            ManyMapping::Arrays => self
                .engine
                .get(&codec::feature_key(COLLECTION, key))?
                .map(|b| codec::decode_array(&b))
                .transpose(),
        }
    }

    /// Replace the whole collection.
    fn write_list(&self, key: &SingleFeatureKey, values: &[RawValue]) -> BackendResult<()> {
        match self.mapping {
            ManyMapping::Indices => {
                let old = self.read_size(key)?.unwrap_or(0);
                for (i, value) in values.iter().enumerate() {
                    self.write_slot(&key.at(i), value)?;
                }
                for i in values.len()..old {
                    self.engine.delete(&codec::slot_key(&key.at(i)))?;
                }
                self.write_size(key, values.len())
            }
            ManyMapping::Lists => self
                .engine
                .put(&codec::feature_key(COLLECTION, key), &codec::encode(&values)?),
            ManyMapping::Arrays => self.engine.put(
                &codec::feature_key(COLLECTION, key),
                &codec::encode_array(values)?,
            ),
        }
    }

    /// Load, edit and store a list-encoded collection.
    fn modify<R>(
        &self,
        key: &SingleFeatureKey,
        edit: impl FnOnce(&mut Vec<RawValue>) -> BackendResult<R>,
    ) -> BackendResult<R> {
        let mut values = self.read_list(key)?.unwrap_or_default();
        let result = edit(&mut values)?;
        self.write_list(key, &values)?;
        Ok(result)
    }

    fn insert_locked(&self, key: &ManyFeatureKey, values: Vec<RawValue>) -> BackendResult<()> {
        let feature = key.feature_key();
        let pos = key.position;
        match self.mapping {
            ManyMapping::Indices => {
                let size = self.read_size(&feature)?.unwrap_or(0);
                if pos > size {
                    return Err(out_of_bounds(pos, size));
                }
                let count = values.len();
                for i in (pos..size).rev() {
                    self.copy_slot(&feature, i, i + count)?;
                }
                for (offset, value) in values.iter().enumerate() {
                    self.write_slot(&feature.at(pos + offset), value)?;
                }
                self.write_size(&feature, size + count)
            }
            ManyMapping::Lists | ManyMapping::Arrays => self.modify(&feature, |list| {
                if pos > list.len() {
                    return Err(out_of_bounds(pos, list.len()));
                }
                list.splice(pos..pos, values);
                Ok(())
            }),
        }
    }

    fn remove_locked(&self, key: &ManyFeatureKey) -> BackendResult<RawValue> {
        let feature = key.feature_key();
        let pos = key.position;
        match self.mapping {
            ManyMapping::Indices => {
                let size = self.read_size(&feature)?.unwrap_or(0);
                if pos >= size {
                    return Err(out_of_bounds(pos, size));
                }
                let removed = self.read_slot(key)?.ok_or_else(|| missing_slot(&feature, pos))?;
                for i in pos + 1..size {
                    self.copy_slot(&feature, i, i - 1)?;
                }
                self.engine.delete(&codec::slot_key(&feature.at(size - 1)))?;
                self.write_size(&feature, size - 1)?;
                Ok(removed)
            }
            ManyMapping::Lists | ManyMapping::Arrays => self.modify(&feature, |list| {
                if pos >= list.len() {
                    return Err(out_of_bounds(pos, list.len()));
                }
                Ok(list.remove(pos))
            }),
        }
    }

    fn delete_collection(&self, key: &SingleFeatureKey) -> BackendResult<()> {
        match self.mapping {
            ManyMapping::Indices => {
                if let Some(size) = self.read_size(key)? {
                    for i in 0..size {
                        self.engine.delete(&codec::slot_key(&key.at(i)))?;
                    }
                    self.engine.delete(&codec::feature_key(SIZE, key))?;
                }
                Ok(())
            }
            ManyMapping::Lists | ManyMapping::Arrays => {
                self.engine.delete(&codec::feature_key(COLLECTION, key))
            }
        }
    }
}

impl<E: KvEngine> std::fmt::Debug for MappedBackend<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBackend")
            .field("engine", &self.engine.name())
            .field("mapping", &self.mapping)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn out_of_bounds(index: usize, size: usize) -> BackendError {
    BackendError::IndexOutOfBounds { index, size }
}

fn missing_slot(key: &SingleFeatureKey, position: usize) -> BackendError {
    BackendError::Corrupt(format!("missing slot {}", key.at(position)))
}

impl<E: KvEngine> Backend for MappedBackend<E> {
    fn name(&self) -> String {
        format!("{}/{}", self.engine.name(), self.mapping)
    }

    fn is_persistent(&self) -> bool {
        self.engine.is_persistent()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn container_of(&self, id: Id) -> BackendResult<Option<ContainerDescriptor>> {
        self.check_open()?;
        self.engine
            .get(&codec::id_key(CONTAINER, id))?
            .map(|b| codec::decode(&b))
            .transpose()
    }

    fn container_for(&self, id: Id, container: ContainerDescriptor) -> BackendResult<()> {
        self.check_open()?;
        self.engine
            .put(&codec::id_key(CONTAINER, id), &codec::encode(&container)?)
    }

    fn unset_container(&self, id: Id) -> BackendResult<()> {
        self.check_open()?;
        self.engine.delete(&codec::id_key(CONTAINER, id))
    }

    fn metaclass_of(&self, id: Id) -> BackendResult<Option<ClassBean>> {
        self.check_open()?;
        self.engine
            .get(&codec::id_key(METACLASS, id))?
            .map(|b| codec::decode(&b))
            .transpose()
    }

    fn metaclass_for(&self, id: Id, class: &ClassBean) -> BackendResult<bool> {
        self.check_open()?;
        let key = codec::id_key(METACLASS, id);
        let _guard = self.stripe(&id).write();
        if self.engine.contains(&key)? {
            return Ok(false);
        }
        self.engine.put(&key, &codec::encode(class)?)?;
        Ok(true)
    }

    fn all_instances_of(&self, classes: &[ClassBean]) -> BackendResult<Vec<Id>> {
        self.check_open()?;
        let mut ids = Vec::new();
        for (key, value) in self.engine.scan_prefix(&[METACLASS])? {
            let class: ClassBean = codec::decode(&value)?;
            if !classes.contains(&class) {
                continue;
            }
            if let StorageKey::Metaclass(id) = codec::decode_key(&key)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn value_of(&self, key: &SingleFeatureKey) -> BackendResult<Option<RawValue>> {
        self.check_open()?;
        self.engine
            .get(&codec::feature_key(VALUE, key))?
            .map(|b| codec::decode(&b))
            .transpose()
    }

    fn value_for(&self, key: &SingleFeatureKey, value: RawValue) -> BackendResult<Option<RawValue>> {
        self.check_open()?;
        codec::check_feature(key)?;
        let storage = codec::feature_key(VALUE, key);
        let _guard = self.stripe(key).write();
        let previous = self
            .engine
            .get(&storage)?
            .map(|b| codec::decode(&b))
            .transpose()?;
        self.engine.put(&storage, &codec::encode(&value)?)?;
        Ok(previous)
    }

    fn unset_value(&self, key: &SingleFeatureKey) -> BackendResult<()> {
        self.check_open()?;
        let _guard = self.stripe(key).write();
        self.engine.delete(&codec::feature_key(VALUE, key))?;
        self.delete_collection(key)
    }

    fn has_value(&self, key: &SingleFeatureKey) -> BackendResult<bool> {
        self.check_open()?;
        let collection = match self.mapping {
            ManyMapping::Indices => SIZE,
            ManyMapping::Lists | ManyMapping::Arrays => COLLECTION,
        };
        Ok(self.engine.contains(&codec::feature_key(VALUE, key))?
            || self.engine.contains(&codec::feature_key(collection, key))?)
    }

    fn value_at(&self, key: &ManyFeatureKey) -> BackendResult<Option<RawValue>> {
        self.check_open()?;
        let feature = key.feature_key();
        let _guard = self.stripe(&feature).read();
        match self.mapping {
            ManyMapping::Indices => self.read_slot(key),
            ManyMapping::Lists => Ok(self
                .read_list(&feature)?
                .and_then(|mut values| {
                    (key.position < values.len()).then(|| values.swap_remove(key.position))
                })),
            ManyMapping::Arrays => self
                .engine
                .get(&codec::feature_key(COLLECTION, &feature))?
                .map(|b| codec::array_get(&b, key.position))
                .transpose()
                .map(Option::flatten),
        }
    }

    fn all_values_of(&self, key: &SingleFeatureKey) -> BackendResult<Vec<RawValue>> {
        self.check_open()?;
        let _guard = self.stripe(key).read();
        Ok(self.read_list(key)?.unwrap_or_default())
    }

    fn set_value_at(&self, key: &ManyFeatureKey, value: RawValue) -> BackendResult<RawValue> {
        self.check_open()?;
        let feature = key.feature_key();
        let _guard = self.stripe(&feature).write();
        let pos = key.position;
        match self.mapping {
            ManyMapping::Indices => {
                let size = self.read_size(&feature)?.unwrap_or(0);
                if pos >= size {
                    return Err(out_of_bounds(pos, size));
                }
                let previous = self.read_slot(key)?.ok_or_else(|| missing_slot(&feature, pos))?;
                self.write_slot(key, &value)?;
                Ok(previous)
            }
            ManyMapping::Lists | ManyMapping::Arrays => self.modify(&feature, |list| {
                if pos >= list.len() {
                    return Err(out_of_bounds(pos, list.len()));
                }
                Ok(std::mem::replace(&mut list[pos], value))
            }),
        }
    }

    fn add_all_values(&self, key: &ManyFeatureKey, values: Vec<RawValue>) -> BackendResult<()> {
        self.check_open()?;
        let feature = key.feature_key();
        codec::check_feature(&feature)?;
        let _guard = self.stripe(&feature).write();
        self.insert_locked(key, values)
    }

    fn append_all_values(&self, key: &SingleFeatureKey, values: Vec<RawValue>) -> BackendResult<usize> {
        self.check_open()?;
        codec::check_feature(key)?;
        let _guard = self.stripe(key).write();
        match self.mapping {
            ManyMapping::Indices => {
                let first = self.read_size(key)?.unwrap_or(0);
                for (offset, value) in values.iter().enumerate() {
                    self.write_slot(&key.at(first + offset), value)?;
                }
                self.write_size(key, first + values.len())?;
                Ok(first)
            }
            ManyMapping::Lists | ManyMapping::Arrays => self.modify(key, |list| {
                let first = list.len();
                list.extend(values);
                Ok(first)
            }),
        }
    }

    fn remove_value(&self, key: &ManyFeatureKey) -> BackendResult<RawValue> {
        self.check_open()?;
        let _guard = self.stripe(&key.feature_key()).write();
        self.remove_locked(key)
    }

    fn move_value(&self, source: &ManyFeatureKey, target: usize) -> BackendResult<RawValue> {
        self.check_open()?;
        let feature = source.feature_key();
        let _guard = self.stripe(&feature).write();
        let size = self.read_size(&feature)?.unwrap_or(0);
        if source.position >= size {
            return Err(out_of_bounds(source.position, size));
        }
        if target >= size {
            return Err(out_of_bounds(target, size));
        }
        match self.mapping {
            ManyMapping::Indices => {
                let from = source.position;
                let value = self.read_slot(source)?.ok_or_else(|| missing_slot(&feature, from))?;
                if from < target {
                    for i in from..target {
                        self.copy_slot(&feature, i + 1, i)?;
                    }
                } else {
                    for i in (target + 1..=from).rev() {
                        self.copy_slot(&feature, i - 1, i)?;
                    }
                }
                self.write_slot(&feature.at(target), &value)?;
                Ok(value)
            }
            ManyMapping::Lists | ManyMapping::Arrays => self.modify(&feature, |list| {
                let value = list.remove(source.position);
                list.insert(target, value.clone());
                Ok(value)
            }),
        }
    }

    fn clear_values(&self, key: &SingleFeatureKey) -> BackendResult<()> {
        self.check_open()?;
        codec::check_feature(key)?;
        let _guard = self.stripe(key).write();
        self.write_list(key, &[])
    }

    fn size_of(&self, key: &SingleFeatureKey) -> BackendResult<Option<usize>> {
        self.check_open()?;
        let _guard = self.stripe(key).read();
        self.read_size(key)
    }

    fn save(&self) -> BackendResult<()> {
        self.check_open()?;
        self.engine.flush()
    }

    fn close(&self) -> BackendResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(backend = %self.name(), "closing backend");
        self.engine.close()
    }

    fn records(&self) -> BackendResult<Vec<Record>> {
        self.check_open()?;
        let mut records = Vec::new();
        for (key, value) in self.engine.scan_prefix(&[])? {
            let record = match codec::decode_key(&key)? {
                StorageKey::Container(id) => Record::Container {
                    id,
                    container: codec::decode(&value)?,
                },
                StorageKey::Metaclass(id) => Record::Metaclass {
                    id,
                    class: codec::decode(&value)?,
                },
                StorageKey::Value(key) => Record::Value {
                    value: codec::decode(&value)?,
                    key,
                },
                StorageKey::Collection(key) | StorageKey::Size(key) => {
                    let _guard = self.stripe(&key).read();
                    Record::Values {
                        values: self.read_list(&key)?.unwrap_or_default(),
                        key,
                    }
                }
                StorageKey::Slot(_) => continue,
            };
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;
    use crate::engine::{FileEngine, MemoryEngine};
    use proptest::prelude::*;

    const MAPPINGS: [ManyMapping; 3] = [ManyMapping::Indices, ManyMapping::Lists, ManyMapping::Arrays];

    // -----------------------------------------------------------------------
    // Shared behaviour
    // -----------------------------------------------------------------------

    #[test]
    fn memory_engine_conforms_for_every_mapping() {
        for mapping in MAPPINGS {
            conformance::run_all(&|| -> Box<dyn Backend> {
                Box::new(MappedBackend::new(MemoryEngine::new(), mapping))
            });
        }
    }

    #[test]
    fn file_engine_conforms_for_every_mapping() {
        for mapping in MAPPINGS {
            let dir = tempfile::tempdir().unwrap();
            let counter = std::sync::atomic::AtomicUsize::new(0);
            conformance::run_all(&|| -> Box<dyn Backend> {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                let engine = FileEngine::open(&dir.path().join(n.to_string())).unwrap();
                Box::new(MappedBackend::new(engine, mapping))
            });
        }
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    #[test]
    fn indices_store_one_record_per_slot() {
        let backend = MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices);
        let key = SingleFeatureKey::new(Id::generate(), "items");
        backend
            .append_all_values(&key, vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        // three slots plus the size record
        assert_eq!(backend.engine().len(), 4);
        backend.remove_value(&key.at(0)).unwrap();
        assert_eq!(backend.engine().len(), 3);
    }

    #[test]
    fn lists_and_arrays_store_one_record() {
        for mapping in [ManyMapping::Lists, ManyMapping::Arrays] {
            let backend = MappedBackend::new(MemoryEngine::new(), mapping);
            let key = SingleFeatureKey::new(Id::generate(), "items");
            backend
                .append_all_values(&key, vec!["a".into(), "b".into()])
                .unwrap();
            assert_eq!(backend.engine().len(), 1);
        }
    }

    #[test]
    fn data_survives_reopen() {
        for mapping in MAPPINGS {
            let dir = tempfile::tempdir().unwrap();
            let id = Id::generate();
            let key = SingleFeatureKey::new(id, "items");
            {
                let backend = MappedBackend::new(FileEngine::open(dir.path()).unwrap(), mapping);
                backend.metaclass_for(id, &ClassBean::new("A", "urn:t")).unwrap();
                backend
                    .append_all_values(&key, vec!["x".into(), "y".into()])
                    .unwrap();
                backend.close().unwrap();
            }
            let backend = MappedBackend::new(FileEngine::open(dir.path()).unwrap(), mapping);
            assert_eq!(
                backend.metaclass_of(id).unwrap(),
                Some(ClassBean::new("A", "urn:t"))
            );
            assert_eq!(
                backend.all_values_of(&key).unwrap(),
                vec![RawValue::from("x"), RawValue::from("y")]
            );
        }
    }

    #[test]
    fn copy_between_mappings() {
        let source = MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices);
        let key = SingleFeatureKey::new(Id::generate(), "items");
        source
            .append_all_values(&key, vec!["1".into(), "2".into(), "3".into()])
            .unwrap();
        let target = MappedBackend::new(MemoryEngine::new(), ManyMapping::Arrays);
        source.copy_to(&target).unwrap();
        assert_eq!(target.size_of(&key).unwrap(), Some(3));
        assert_eq!(target.value_at(&key.at(2)).unwrap(), Some(RawValue::from("3")));
    }

    #[test]
    fn concurrent_appends_stay_dense() {
        let backend = std::sync::Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices));
        let key = SingleFeatureKey::new(Id::generate(), "items");
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let backend = backend.clone();
                let key = key.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        backend
                            .append_value(&key, RawValue::Literal(format!("{t}-{i}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(backend.size_of(&key).unwrap(), Some(200));
        for i in 0..200 {
            assert!(backend.value_at(&key.at(i)).unwrap().is_some());
        }
    }

    // -----------------------------------------------------------------------
    // Index contiguity
    // -----------------------------------------------------------------------

    #[derive(Clone, Debug)]
    enum Op {
        Append(u8),
        Insert(usize, u8),
        Remove(usize),
        Move(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Append),
            (0usize..16, any::<u8>()).prop_map(|(i, v)| Op::Insert(i, v)),
            (0usize..16).prop_map(Op::Remove),
            (0usize..16, 0usize..16).prop_map(|(a, b)| Op::Move(a, b)),
        ]
    }

    proptest! {
        #[test]
        fn positions_stay_contiguous(ops in proptest::collection::vec(op(), 1..40)) {
            for mapping in MAPPINGS {
                let backend = MappedBackend::new(MemoryEngine::new(), mapping);
                let key = SingleFeatureKey::new(Id::ROOT, "items");
                let mut model: Vec<RawValue> = Vec::new();
                for op in &ops {
                    match *op {
                        Op::Append(v) => {
                            let value = RawValue::Literal(v.to_string());
                            backend.append_value(&key, value.clone()).unwrap();
                            model.push(value);
                        }
                        Op::Insert(i, v) if i <= model.len() => {
                            let value = RawValue::Literal(v.to_string());
                            backend.add_value(&key.at(i), value.clone()).unwrap();
                            model.insert(i, value);
                        }
                        Op::Remove(i) if i < model.len() => {
                            let removed = backend.remove_value(&key.at(i)).unwrap();
                            prop_assert_eq!(removed, model.remove(i));
                        }
                        Op::Move(from, to) if from < model.len() && to < model.len() => {
                            backend.move_value(&key.at(from), to).unwrap();
                            let value = model.remove(from);
                            model.insert(to, value);
                        }
                        _ => {}
                    }
                }
                let size = backend.size_of(&key).unwrap().unwrap_or(0);
                prop_assert_eq!(size, model.len());
                for (i, expected) in model.iter().enumerate() {
                    let actual = backend.value_at(&key.at(i)).unwrap();
                    prop_assert_eq!(actual.as_ref(), Some(expected));
                }
                prop_assert_eq!(backend.value_at(&key.at(size)).unwrap(), None);
            }
        }
    }
}
