use std::fmt::Debug;
use std::sync::Arc;

use arbor_backend::Backend;
use arbor_schema::{Feature, SchemaRegistry, Value};
use arbor_types::{ClassBean, Id, ObjectRef};
use tracing::Level;

use crate::error::StoreResult;
use crate::traits::Store;

/// Logs every call, its arguments and its outcome at a fixed level.
pub struct LoggingStore {
    inner: Box<dyn Store>,
    level: Level,
}

impl LoggingStore {
    pub fn new(inner: Box<dyn Store>, level: Level) -> Self {
        Self { inner, level }
    }

    fn log<T: Debug>(&self, op: &str, target: &dyn Debug, result: StoreResult<T>) -> StoreResult<T> {
        match &result {
            Ok(value) => self.emit(format_args!("{op} {target:?} -> {value:?}")),
            Err(e) => self.emit(format_args!("{op} {target:?} failed: {e}")),
        }
        result
    }

    fn emit(&self, message: std::fmt::Arguments<'_>) {
        match self.level {
            Level::TRACE => tracing::trace!("{message}"),
            Level::DEBUG => tracing::debug!("{message}"),
            Level::INFO => tracing::info!("{message}"),
            Level::WARN => tracing::warn!("{message}"),
            Level::ERROR => tracing::error!("{message}"),
        }
    }
}

fn call<'a>(object: &'a ObjectRef, feature: &'a Feature, index: Option<usize>) -> (&'a ObjectRef, &'a str, Option<usize>) {
    (object, feature.name(), index)
}

impl Store for LoggingStore {
    fn get(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>) -> StoreResult<Option<Value>> {
        self.log("get", &call(object, feature, index), self.inner.get(object, feature, index))
    }

    fn set(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        value: Value,
    ) -> StoreResult<Option<Value>> {
        let target = (call(object, feature, index), value.clone());
        self.log("set", &target, self.inner.set(object, feature, index, value))
    }

    fn is_set(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<bool> {
        self.log("is_set", &call(object, feature, None), self.inner.is_set(object, feature))
    }

    fn unset(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.log("unset", &call(object, feature, None), self.inner.unset(object, feature))
    }

    fn size(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<usize> {
        self.log("size", &call(object, feature, None), self.inner.size(object, feature))
    }

    fn contains(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<bool> {
        let target = (call(object, feature, None), value);
        self.log("contains", &target, self.inner.contains(object, feature, value))
    }

    fn index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>> {
        let target = (call(object, feature, None), value);
        self.log("index_of", &target, self.inner.index_of(object, feature, value))
    }

    fn last_index_of(&self, object: &ObjectRef, feature: &Feature, value: &Value) -> StoreResult<Option<usize>> {
        let target = (call(object, feature, None), value);
        self.log("last_index_of", &target, self.inner.last_index_of(object, feature, value))
    }

    fn add(&self, object: &ObjectRef, feature: &Feature, index: Option<usize>, value: Value) -> StoreResult<()> {
        let target = (call(object, feature, index), value.clone());
        self.log("add", &target, self.inner.add(object, feature, index, value))
    }

    fn add_all(
        &self,
        object: &ObjectRef,
        feature: &Feature,
        index: Option<usize>,
        values: Vec<Value>,
    ) -> StoreResult<()> {
        let target = (call(object, feature, index), values.len());
        self.log("add_all", &target, self.inner.add_all(object, feature, index, values))
    }

    fn remove(&self, object: &ObjectRef, feature: &Feature, index: usize) -> StoreResult<Value> {
        self.log("remove", &call(object, feature, Some(index)), self.inner.remove(object, feature, index))
    }

    fn move_value(&self, object: &ObjectRef, feature: &Feature, target: usize, source: usize) -> StoreResult<Value> {
        let args = (call(object, feature, Some(source)), target);
        self.log("move", &args, self.inner.move_value(object, feature, target, source))
    }

    fn clear(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<()> {
        self.log("clear", &call(object, feature, None), self.inner.clear(object, feature))
    }

    fn to_vec(&self, object: &ObjectRef, feature: &Feature) -> StoreResult<Vec<Value>> {
        self.log("to_vec", &call(object, feature, None), self.inner.to_vec(object, feature))
    }

    fn container_of(&self, id: Id) -> StoreResult<Option<(ObjectRef, Arc<Feature>)>> {
        let result = self.inner.container_of(id);
        let shown = result
            .as_ref()
            .map(|c| c.as_ref().map(|(container, feature)| (container.clone(), feature.name().to_string())));
        match shown {
            Ok(value) => self.emit(format_args!("container_of {id:?} -> {value:?}")),
            Err(e) => self.emit(format_args!("container_of {id:?} failed: {e}")),
        }
        result
    }

    fn resolve(&self, id: Id) -> StoreResult<ObjectRef> {
        self.log("resolve", &id, self.inner.resolve(id))
    }

    fn update_instance_of(&self, object: &ObjectRef) -> StoreResult<()> {
        self.log("update_instance_of", object, self.inner.update_instance_of(object))
    }

    fn all_instances_of(&self, class: &ClassBean, strict: bool) -> StoreResult<Vec<ObjectRef>> {
        let result = self.inner.all_instances_of(class, strict);
        match &result {
            Ok(found) => self.emit(format_args!("all_instances_of {class} strict={strict} -> {} objects", found.len())),
            Err(e) => self.emit(format_args!("all_instances_of {class} strict={strict} failed: {e}")),
        }
        result
    }

    fn save(&self) -> StoreResult<()> {
        self.log("save", &self.inner.backend().name(), self.inner.save())
    }

    fn close(&self) -> StoreResult<()> {
        self.log("close", &self.inner.backend().name(), self.inner.close())
    }

    fn backend(&self) -> Arc<dyn Backend> {
        self.inner.backend()
    }

    fn registry(&self) -> Arc<SchemaRegistry> {
        self.inner.registry()
    }
}
