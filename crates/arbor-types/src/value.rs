use serde::{Deserialize, Serialize};

use crate::id::Id;

/// The engine-agnostic form of one stored value.
///
/// Attributes are kept as their serialized literal, references as the
/// target's `Id`. A reference never owns its target.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawValue {
    Literal(String),
    Reference(Id),
}

impl RawValue {
    pub fn as_reference(&self) -> Option<Id> {
        match self {
            Self::Reference(id) => Some(*id),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(s) => Some(s),
            Self::Reference(_) => None,
        }
    }
}

impl From<Id> for RawValue {
    fn from(id: Id) -> Self {
        Self::Reference(id)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}
