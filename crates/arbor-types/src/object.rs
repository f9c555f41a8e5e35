use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::class::ClassBean;
use crate::id::Id;

/// Lazy handle to a stored object.
///
/// Holding an `ObjectRef` does not load any of the object's features; it
/// only carries what is needed to address them. Two refs are the same
/// object iff their ids are equal.
#[derive(Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    id: Id,
    class: ClassBean,
}

impl ObjectRef {
    pub fn new(id: Id, class: ClassBean) -> Self {
        Self { id, class }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn class(&self) -> &ClassBean {
        &self.class
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} : {})", self.id.short_id(), self.class.name())
    }
}
