//! The built-in resource schema.
//!
//! Every resource has one synthetic `Root` object, stored under
//! [`Id::ROOT`](arbor_types::Id::ROOT), whose `contents` containment
//! reference holds the resource's top-level objects. `Object` is the
//! universal supertype: any class is a subtype of it.

use arbor_types::ClassBean;

use crate::class::ClassDef;
use crate::feature::{FeatureDef, FeatureKindDef};
use crate::schema::SchemaDef;

pub const RESOURCE_URI: &str = "arbor:resource";
pub const RESOURCE_PREFIX: &str = "arbor";
pub const ROOT_CLASS: &str = "Root";
pub const OBJECT_CLASS: &str = "Object";
pub const CONTENTS: &str = "contents";

pub fn root_class() -> ClassBean {
    ClassBean::new(ROOT_CLASS, RESOURCE_URI)
}

pub fn object_class() -> ClassBean {
    ClassBean::new(OBJECT_CLASS, RESOURCE_URI)
}

pub(crate) fn resource_schema() -> SchemaDef {
    SchemaDef::new(RESOURCE_URI, RESOURCE_PREFIX)
        .class(ClassDef::new(OBJECT_CLASS).abstract_class())
        .class(ClassDef::new(ROOT_CLASS).feature(FeatureDef {
            name: CONTENTS.into(),
            kind: FeatureKindDef::Reference {
                target: OBJECT_CLASS.into(),
                containment: true,
            },
            many: true,
            default: None,
        }))
}
