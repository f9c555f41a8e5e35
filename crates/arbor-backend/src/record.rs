use arbor_types::{ClassBean, ContainerDescriptor, Id, RawValue, SingleFeatureKey};

use crate::error::BackendResult;
use crate::traits::Backend;

/// One logical record of a backend, independent of how it is laid out.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Container {
        id: Id,
        container: ContainerDescriptor,
    },
    Metaclass {
        id: Id,
        class: ClassBean,
    },
    Value {
        key: SingleFeatureKey,
        value: RawValue,
    },
    Values {
        key: SingleFeatureKey,
        values: Vec<RawValue>,
    },
}

impl Record {
    /// Write this record into `target`, replacing what it holds for the same key.
    pub fn apply(self, target: &dyn Backend) -> BackendResult<()> {
        match self {
            Self::Container { id, container } => target.container_for(id, container),
            Self::Metaclass { id, class } => target.metaclass_for(id, &class).map(|_| ()),
            Self::Value { key, value } => target.value_for(&key, value).map(|_| ()),
            Self::Values { key, values } => {
                target.unset_value(&key)?;
                target.clear_values(&key)?;
                if !values.is_empty() {
                    target.append_all_values(&key, values)?;
                }
                Ok(())
            }
        }
    }
}
