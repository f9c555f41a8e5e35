use std::collections::HashMap;
use std::sync::{Arc, Weak};

use arbor_backend::{BackendRegistry, TransientBackend};
use arbor_schema::{SchemaRegistry, Value};
use arbor_store::{DirectStore, Store, NO_INDEX};
use arbor_types::{ClassBean, Id, ObjectRef};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{SdkError, SdkResult};
use crate::object::{Binding, ObjectState, PersistentObject};

/// Live object states by id, held weakly.
struct IdentityMap {
    states: HashMap<Id, Weak<ObjectState>>,
    prune_at: usize,
}

impl IdentityMap {
    fn get(&self, id: Id) -> Option<Arc<ObjectState>> {
        self.states.get(&id).and_then(Weak::upgrade)
    }

    fn insert(&mut self, state: &Arc<ObjectState>) {
        if self.states.len() >= self.prune_at {
            self.states.retain(|_, state| state.strong_count() > 0);
            self.prune_at = (self.states.len() * 2).max(1024);
        }
        self.states.insert(state.object().id(), Arc::downgrade(state));
    }
}

/// Everything objects and resources share: the schema and backend
/// registries, the store holding objects that belong to no resource, and
/// the identity map that keeps one handle state per live object.
pub struct Context {
    schemas: Arc<SchemaRegistry>,
    backends: Arc<BackendRegistry>,
    transient: Arc<dyn Store>,
    objects: Mutex<IdentityMap>,
}

impl Context {
    pub fn new(schemas: Arc<SchemaRegistry>) -> Arc<Self> {
        Self::with_backends(schemas, Arc::new(BackendRegistry::with_defaults()))
    }

    pub fn with_backends(schemas: Arc<SchemaRegistry>, backends: Arc<BackendRegistry>) -> Arc<Self> {
        let transient = DirectStore::new(Arc::new(TransientBackend::new()), Arc::clone(&schemas));
        Arc::new(Self {
            schemas,
            backends,
            transient: Arc::new(transient),
            objects: Mutex::new(IdentityMap {
                states: HashMap::new(),
                prune_at: 1024,
            }),
        })
    }

    pub fn schemas(&self) -> Arc<SchemaRegistry> {
        Arc::clone(&self.schemas)
    }

    pub fn backends(&self) -> Arc<BackendRegistry> {
        Arc::clone(&self.backends)
    }

    /// A new object of `class`, not yet part of any resource.
    pub fn create(self: &Arc<Self>, class: &ClassBean) -> SdkResult<PersistentObject> {
        let info = self.schemas.class(class)?;
        if info.is_abstract() {
            return Err(SdkError::AbstractClass(class.to_string()));
        }
        let object = ObjectRef::new(Id::generate(), class.clone());
        self.transient.update_instance_of(&object)?;
        Ok(self.handle(object, &self.transient_binding()))
    }

    pub(crate) fn transient_binding(&self) -> Binding {
        Binding {
            store: Arc::clone(&self.transient),
            resource: None,
        }
    }

    /// The handle of `object`, reusing the live state if there is one.
    pub(crate) fn handle(self: &Arc<Self>, object: ObjectRef, binding: &Binding) -> PersistentObject {
        let mut objects = self.objects.lock();
        let state = match objects.get(object.id()) {
            Some(state) => state,
            None => {
                let state = Arc::new(ObjectState::new(object, binding.clone()));
                objects.insert(&state);
                state
            }
        };
        PersistentObject::new(state, Arc::clone(self))
    }

    /// Where `object` currently lives: its live binding, else `fallback` if
    /// that store knows the object, else the transient store if it does.
    pub(crate) fn binding_of(&self, object: &ObjectRef, fallback: &Binding) -> SdkResult<Binding> {
        if let Some(state) = self.objects.lock().get(object.id()) {
            return Ok(state.binding());
        }
        if fallback.store.backend().metaclass_of(object.id())?.is_some() {
            return Ok(fallback.clone());
        }
        if self.transient.backend().metaclass_of(object.id())?.is_some() {
            return Ok(self.transient_binding());
        }
        Ok(fallback.clone())
    }

    pub(crate) fn forget_container(&self, id: Id) {
        if let Some(state) = self.objects.lock().get(id) {
            state.forget_container();
        }
    }

    /// Take `child` out of the slot holding it in `store`, before it moves
    /// to another store.
    pub(crate) fn leave_container(&self, child: &ObjectRef, store: &dyn Store) -> SdkResult<()> {
        let Some((owner, feature)) = store.container_of(child.id())? else {
            return Ok(());
        };
        if feature.is_many() {
            if let Some(index) = store.index_of(&owner, &feature, &Value::Object(child.clone()))? {
                store.remove(&owner, &feature, index)?;
            }
        } else {
            store.unset(&owner, &feature)?;
        }
        Ok(())
    }

    /// Move `object` and everything it contains from `from` into `to`.
    ///
    /// Children are moved before they are linked into their owner, and each
    /// feature is unset in `from` once copied.
    pub(crate) fn transfer(&self, object: &ObjectRef, from: &dyn Store, to: &Binding) -> SdkResult<()> {
        to.store.update_instance_of(object)?;
        let class = self.schemas.class(object.class())?;
        for feature in class.features() {
            if !from.is_set(object, feature)? {
                continue;
            }
            let values = if feature.is_many() {
                from.to_vec(object, feature)?
            } else {
                from.get(object, feature, None)?.into_iter().collect()
            };
            if feature.is_containment() {
                for value in &values {
                    if let Value::Object(child) = value {
                        self.transfer(child, from, to)?;
                    }
                }
            }
            if feature.is_many() {
                if values.is_empty() {
                    to.store.clear(object, feature)?;
                } else {
                    to.store.add_all(object, feature, NO_INDEX, values)?;
                }
            } else if let Some(value) = values.into_iter().next() {
                to.store.set(object, feature, None, value)?;
            }
            from.unset(object, feature)?;
        }
        trace!(id = %object.id(), "object moved");

        if let Some(state) = self.objects.lock().get(object.id()) {
            state.rebind(to.clone());
        }
        Ok(())
    }
}
