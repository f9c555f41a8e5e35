use arbor_types::ClassBean;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;

/// What a feature holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    /// A primitive value.
    Attribute(DataType),
    /// A link to another object. Containment references also own their
    /// target: the target records the slot holding it as its container.
    Reference { target: ClassBean, containment: bool },
}

/// A resolved structural feature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feature {
    name: String,
    kind: FeatureKind,
    many: bool,
    default: Option<String>,
}

impl Feature {
    pub fn attribute(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Attribute(data_type),
            many: false,
            default: None,
        }
    }

    pub fn reference(name: impl Into<String>, target: ClassBean) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Reference {
                target,
                containment: false,
            },
            many: false,
            default: None,
        }
    }

    pub fn containment(name: impl Into<String>, target: ClassBean) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Reference {
                target,
                containment: true,
            },
            many: false,
            default: None,
        }
    }

    /// Make this feature multi-valued.
    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    /// Literal returned by `get` while the feature is unset.
    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    pub fn is_many(&self) -> bool {
        self.many
    }

    pub fn default_literal(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, FeatureKind::Attribute(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FeatureKind::Reference { .. })
    }

    pub fn is_containment(&self) -> bool {
        matches!(
            self.kind,
            FeatureKind::Reference {
                containment: true,
                ..
            }
        )
    }

    pub fn data_type(&self) -> Option<&DataType> {
        match &self.kind {
            FeatureKind::Attribute(dt) => Some(dt),
            FeatureKind::Reference { .. } => None,
        }
    }

    pub fn target(&self) -> Option<&ClassBean> {
        match &self.kind {
            FeatureKind::Reference { target, .. } => Some(target),
            FeatureKind::Attribute(_) => None,
        }
    }
}

/// Serialized form of a feature inside a schema document.
///
/// ```json
/// { "name": "title", "kind": "attribute", "data_type": "string" }
/// { "name": "children", "kind": "reference", "target": "Node", "containment": true, "many": true }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKindDef,
    #[serde(default)]
    pub many: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKindDef {
    Attribute {
        data_type: DataType,
    },
    /// `target` is a class name of the same schema, or `uri#Name`.
    Reference {
        target: String,
        #[serde(default)]
        containment: bool,
    },
}

impl FeatureDef {
    /// Resolve against the URI of the schema declaring it.
    pub(crate) fn resolve(&self, schema_uri: &str) -> Feature {
        let kind = match &self.kind {
            FeatureKindDef::Attribute { data_type } => FeatureKind::Attribute(data_type.clone()),
            FeatureKindDef::Reference {
                target,
                containment,
            } => FeatureKind::Reference {
                target: qualify(target, schema_uri),
                containment: *containment,
            },
        };
        Feature {
            name: self.name.clone(),
            kind,
            many: self.many,
            default: self.default.clone(),
        }
    }
}

/// Turn `Name` or `uri#Name` into a class bean.
pub(crate) fn qualify(name: &str, schema_uri: &str) -> ClassBean {
    match name.rsplit_once('#') {
        Some((uri, local)) => ClassBean::new(local, uri),
        None => ClassBean::new(name, schema_uri),
    }
}
