use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arbor_types::ClassBean;
use serde::{Deserialize, Serialize};

use crate::feature::{Feature, FeatureDef};

/// Serialized form of a class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Names of direct supertypes (`Name` or `uri#Name`).
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            supertypes: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn feature(mut self, feature: FeatureDef) -> Self {
        self.features.push(feature);
        self
    }
}

/// A resolved class with its precomputed feature table.
///
/// The table lists inherited features first, in supertype order, followed
/// by the class's own features. Lookups by name are O(1).
#[derive(Debug)]
pub struct ClassInfo {
    bean: ClassBean,
    is_abstract: bool,
    supertypes: Vec<ClassBean>,
    ancestors: HashSet<ClassBean>,
    features: Vec<Arc<Feature>>,
    by_name: HashMap<String, usize>,
}

impl ClassInfo {
    pub(crate) fn new(
        bean: ClassBean,
        is_abstract: bool,
        supertypes: Vec<ClassBean>,
        ancestors: HashSet<ClassBean>,
        features: Vec<Arc<Feature>>,
    ) -> Self {
        let by_name = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name().to_string(), i))
            .collect();
        Self {
            bean,
            is_abstract,
            supertypes,
            ancestors,
            features,
            by_name,
        }
    }

    pub fn bean(&self) -> &ClassBean {
        &self.bean
    }

    pub fn name(&self) -> &str {
        self.bean.name()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Direct supertypes.
    pub fn supertypes(&self) -> &[ClassBean] {
        &self.supertypes
    }

    /// Every transitive supertype.
    pub fn ancestors(&self) -> &HashSet<ClassBean> {
        &self.ancestors
    }

    /// All features, inherited ones first.
    pub fn features(&self) -> &[Arc<Feature>] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&Arc<Feature>> {
        self.by_name.get(name).map(|&i| &self.features[i])
    }

    /// True when `feature` is the exact feature this class declares under that name.
    pub fn owns(&self, feature: &Feature) -> bool {
        self.feature(feature.name()).is_some_and(|f| **f == *feature)
    }
}
