use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arbor_schema::{Feature, Value};
use arbor_store::{Store, NO_INDEX};
use arbor_types::{ClassBean, Id, ObjectRef};
use parking_lot::{Mutex, RwLock};

use crate::context::Context;
use crate::error::{SdkError, SdkResult};
use crate::resource::ResourceState;

/// The store an object currently lives in, and its resource if it has one.
#[derive(Clone)]
pub(crate) struct Binding {
    pub store: Arc<dyn Store>,
    pub resource: Option<Arc<ResourceState>>,
}

impl Binding {
    fn same_resource(&self, other: &Binding) -> bool {
        match (&self.resource, &other.resource) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Shared by every handle on one object.
pub(crate) struct ObjectState {
    object: ObjectRef,
    binding: RwLock<Binding>,
    /// Cached container pointer; the store stays the source of truth.
    container: Mutex<Option<Option<(ObjectRef, String)>>>,
}

impl ObjectState {
    pub(crate) fn new(object: ObjectRef, binding: Binding) -> Self {
        Self {
            object,
            binding: RwLock::new(binding),
            container: Mutex::new(None),
        }
    }

    pub(crate) fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub(crate) fn binding(&self) -> Binding {
        self.binding.read().clone()
    }

    pub(crate) fn rebind(&self, binding: Binding) {
        *self.binding.write() = binding;
        self.forget_container();
    }

    pub(crate) fn forget_container(&self) {
        *self.container.lock() = None;
    }
}

/// A handle on one object, addressed by feature name.
///
/// Handles are cheap to clone; all handles on the same id share their
/// state, so attaching one attaches all. An object starts out transient and
/// moves into a resource when it becomes a root or is contained by an
/// object that already lives there.
#[derive(Clone)]
pub struct PersistentObject {
    state: Arc<ObjectState>,
    context: Arc<Context>,
}

impl PersistentObject {
    pub(crate) fn new(state: Arc<ObjectState>, context: Arc<Context>) -> Self {
        Self { state, context }
    }

    pub fn id(&self) -> Id {
        self.state.object.id()
    }

    pub fn class(&self) -> &ClassBean {
        self.state.object.class()
    }

    pub fn object_ref(&self) -> &ObjectRef {
        &self.state.object
    }

    /// Whether the object belongs to a resource.
    pub fn is_mapped(&self) -> bool {
        self.state.binding.read().resource.is_some()
    }

    /// This object as a reference value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.state.object.clone())
    }

    fn binding(&self) -> SdkResult<Binding> {
        let binding = self.state.binding();
        match &binding.resource {
            Some(resource) if resource.is_closed() => Err(SdkError::Closed),
            _ => Ok(binding),
        }
    }

    fn feature(&self, name: &str) -> SdkResult<Arc<Feature>> {
        Ok(self.context.schemas().feature(self.class(), name)?)
    }

    fn handle(&self, value: Value, binding: &Binding) -> Option<PersistentObject> {
        match value {
            Value::Object(object) => Some(self.context.handle(object, binding)),
            _ => None,
        }
    }

    /// Bring a value about to be contained by this object into its store.
    fn adopt(&self, feature: &Feature, value: &Value, binding: &Binding) -> SdkResult<()> {
        let Value::Object(child) = value else {
            return Ok(());
        };
        if !feature.is_containment() {
            return Ok(());
        }
        let current = self.context.binding_of(child, binding)?;
        if !current.same_resource(binding) {
            if current.resource.is_some() {
                return Err(SdkError::InvalidOperation(format!(
                    "object {} belongs to another resource",
                    child.id()
                )));
            }
            self.context.leave_container(child, current.store.as_ref())?;
            self.context.transfer(child, current.store.as_ref(), binding)?;
        }
        self.context.forget_container(child.id());
        Ok(())
    }

    /// Drop cached container pointers of whatever `feature` contains now.
    fn forget_children(&self, feature: &Feature, binding: &Binding) -> SdkResult<()> {
        if feature.is_containment() {
            for value in binding.store.to_vec(&self.state.object, feature)? {
                if let Value::Object(child) = value {
                    self.context.forget_container(child.id());
                }
            }
        }
        Ok(())
    }

    fn forget_value(&self, value: &Value) {
        if let Value::Object(object) = value {
            self.context.forget_container(object.id());
        }
    }

    // ---- Reads ----

    /// The value of a single-valued feature, or its default.
    pub fn get(&self, name: &str) -> SdkResult<Option<Value>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.get(&self.state.object, &feature, None)?)
    }

    pub fn get_at(&self, name: &str, index: usize) -> SdkResult<Option<Value>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.get(&self.state.object, &feature, Some(index))?)
    }

    /// Every value of a feature; a single-valued feature yields at most one.
    pub fn values(&self, name: &str) -> SdkResult<Vec<Value>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.to_vec(&self.state.object, &feature)?)
    }

    /// The object referenced by a single-valued reference.
    pub fn object(&self, name: &str) -> SdkResult<Option<PersistentObject>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        let value = binding.store.get(&self.state.object, &feature, None)?;
        Ok(value.and_then(|v| self.handle(v, &binding)))
    }

    /// The objects referenced by a multi-valued reference, in order.
    pub fn objects(&self, name: &str) -> SdkResult<Vec<PersistentObject>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        let values = binding.store.to_vec(&self.state.object, &feature)?;
        Ok(values.into_iter().filter_map(|v| self.handle(v, &binding)).collect())
    }

    pub fn len(&self, name: &str) -> SdkResult<usize> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.size(&self.state.object, &feature)?)
    }

    pub fn is_set(&self, name: &str) -> SdkResult<bool> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.is_set(&self.state.object, &feature)?)
    }

    pub fn contains(&self, name: &str, value: &Value) -> SdkResult<bool> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.contains(&self.state.object, &feature, value)?)
    }

    pub fn index_of(&self, name: &str, value: &Value) -> SdkResult<Option<usize>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding.store.index_of(&self.state.object, &feature, value)?)
    }

    // ---- Writes ----

    /// Replace a single-valued feature and return the previous value.
    pub fn set(&self, name: &str, value: Value) -> SdkResult<Option<Value>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        self.adopt(&feature, &value, &binding)?;
        let previous = binding.store.set(&self.state.object, &feature, None, value)?;
        if let Some(previous) = &previous {
            self.forget_value(previous);
        }
        Ok(previous)
    }

    pub fn set_at(&self, name: &str, index: usize, value: Value) -> SdkResult<Option<Value>> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        self.adopt(&feature, &value, &binding)?;
        let previous = binding
            .store
            .set(&self.state.object, &feature, Some(index), value)?;
        if let Some(previous) = &previous {
            self.forget_value(previous);
        }
        Ok(previous)
    }

    /// Append to a multi-valued feature.
    pub fn add(&self, name: &str, value: Value) -> SdkResult<()> {
        self.insert_at(name, NO_INDEX, value)
    }

    pub fn insert(&self, name: &str, index: usize, value: Value) -> SdkResult<()> {
        self.insert_at(name, Some(index), value)
    }

    fn insert_at(&self, name: &str, index: Option<usize>, value: Value) -> SdkResult<()> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        self.adopt(&feature, &value, &binding)?;
        binding.store.add(&self.state.object, &feature, index, value)?;
        Ok(())
    }

    pub fn add_all(&self, name: &str, values: Vec<Value>) -> SdkResult<()> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        for value in &values {
            self.adopt(&feature, value, &binding)?;
        }
        binding.store.add_all(&self.state.object, &feature, NO_INDEX, values)?;
        Ok(())
    }

    pub fn remove(&self, name: &str, index: usize) -> SdkResult<Value> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        let removed = binding.store.remove(&self.state.object, &feature, index)?;
        self.forget_value(&removed);
        Ok(removed)
    }

    /// Move the value at `source` to `target`.
    pub fn move_to(&self, name: &str, target: usize, source: usize) -> SdkResult<Value> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        Ok(binding
            .store
            .move_value(&self.state.object, &feature, target, source)?)
    }

    pub fn clear(&self, name: &str) -> SdkResult<()> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        self.forget_children(&feature, &binding)?;
        binding.store.clear(&self.state.object, &feature)?;
        Ok(())
    }

    pub fn unset(&self, name: &str) -> SdkResult<()> {
        let binding = self.binding()?;
        let feature = self.feature(name)?;
        self.forget_children(&feature, &binding)?;
        binding.store.unset(&self.state.object, &feature)?;
        Ok(())
    }

    // ---- Navigation ----

    /// The containing object and the feature holding this one. Roots of a
    /// resource have no container.
    pub fn container(&self) -> SdkResult<Option<(PersistentObject, String)>> {
        let binding = self.binding()?;
        let cached = self.state.container.lock().clone();
        let container = match cached {
            Some(container) => container,
            None => {
                let container = binding
                    .store
                    .container_of(self.id())?
                    .filter(|(owner, _)| !owner.id().is_root())
                    .map(|(owner, feature)| (owner, feature.name().to_string()));
                *self.state.container.lock() = Some(container.clone());
                container
            }
        };
        Ok(container.map(|(owner, feature)| (self.context.handle(owner, &binding), feature)))
    }

    /// Every directly contained object, feature by feature.
    pub fn contents(&self) -> SdkResult<Vec<PersistentObject>> {
        let binding = self.binding()?;
        let class = self.context.schemas().class(self.class())?;
        let mut contents = Vec::new();
        for feature in class.features().iter().filter(|f| f.is_containment()) {
            for value in binding.store.to_vec(&self.state.object, feature)? {
                contents.extend(self.handle(value, &binding));
            }
        }
        Ok(contents)
    }
}

impl PartialEq for PersistentObject {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for PersistentObject {}

impl Hash for PersistentObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for PersistentObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentObject")
            .field("id", &self.id())
            .field("class", self.class())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

impl From<&PersistentObject> for Value {
    fn from(object: &PersistentObject) -> Self {
        object.to_value()
    }
}
