use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// Address of a single-valued feature, or of a multi-valued feature as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SingleFeatureKey {
    pub owner: Id,
    pub feature: String,
}

impl SingleFeatureKey {
    pub fn new(owner: Id, feature: impl Into<String>) -> Self {
        Self {
            owner,
            feature: feature.into(),
        }
    }

    /// Address one slot of this feature.
    pub fn at(&self, position: usize) -> ManyFeatureKey {
        ManyFeatureKey {
            owner: self.owner,
            feature: self.feature.clone(),
            position,
        }
    }
}

impl fmt::Display for SingleFeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner.short_id(), self.feature)
    }
}

/// Address of one slot of a multi-valued feature.
///
/// Positions are zero-based and dense: for a feature of size `n` the valid
/// positions are exactly `0..n`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManyFeatureKey {
    pub owner: Id,
    pub feature: String,
    pub position: usize,
}

impl ManyFeatureKey {
    pub fn new(owner: Id, feature: impl Into<String>, position: usize) -> Self {
        Self {
            owner,
            feature: feature.into(),
            position,
        }
    }

    /// The key of the feature this slot belongs to.
    pub fn feature_key(&self) -> SingleFeatureKey {
        SingleFeatureKey {
            owner: self.owner,
            feature: self.feature.clone(),
        }
    }

    /// Same feature, another position.
    pub fn with_position(&self, position: usize) -> Self {
        Self {
            owner: self.owner,
            feature: self.feature.clone(),
            position,
        }
    }
}

impl fmt::Display for ManyFeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}[{}]",
            self.owner.short_id(),
            self.feature,
            self.position
        )
    }
}

/// Back-pointer from a contained object to the slot that contains it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    /// The containing object.
    pub container: Id,
    /// Name of the containment reference holding the object.
    pub feature: String,
}

impl ContainerDescriptor {
    pub fn new(container: Id, feature: impl Into<String>) -> Self {
        Self {
            container,
            feature: feature.into(),
        }
    }
}

impl From<SingleFeatureKey> for ContainerDescriptor {
    fn from(key: SingleFeatureKey) -> Self {
        Self {
            container: key.owner,
            feature: key.feature,
        }
    }
}
