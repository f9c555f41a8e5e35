//! Shared schema for SDK tests.

use std::sync::Arc;

use arbor_schema::SchemaRegistry;
use arbor_types::ClassBean;

use crate::context::Context;
use crate::object::PersistentObject;

pub const TREE_URI: &str = "urn:test:tree";

const TREE: &str = r#"{
    "uri": "urn:test:tree",
    "prefix": "tree",
    "classes": [
        { "name": "Node", "abstract": true, "features": [
            { "name": "name", "kind": "attribute", "data_type": "string", "default": "unnamed" }
        ]},
        { "name": "Folder", "supertypes": ["Node"], "features": [
            { "name": "children", "kind": "reference", "target": "Node", "containment": true, "many": true },
            { "name": "tags", "kind": "attribute", "data_type": "string", "many": true },
            { "name": "primary", "kind": "reference", "target": "Node", "containment": true },
            { "name": "favorites", "kind": "reference", "target": "Node", "many": true }
        ]},
        { "name": "File", "supertypes": ["Node"], "features": [
            { "name": "size", "kind": "attribute", "data_type": "int" },
            { "name": "kind", "kind": "attribute", "data_type": { "enum": ["TEXT", "BINARY"] } }
        ]}
    ]
}"#;

pub fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    registry.register_json(TREE).unwrap();
    Arc::new(registry)
}

pub fn context() -> Arc<Context> {
    Context::new(registry())
}

pub fn class(name: &str) -> ClassBean {
    ClassBean::new(name, TREE_URI)
}

pub fn folder(context: &Arc<Context>, name: &str) -> PersistentObject {
    let folder = context.create(&class("Folder")).unwrap();
    folder.set("name", arbor_schema::Value::String(name.into())).unwrap();
    folder
}

pub fn file(context: &Arc<Context>, name: &str, size: i64) -> PersistentObject {
    let file = context.create(&class("File")).unwrap();
    file.set("name", arbor_schema::Value::String(name.into())).unwrap();
    file.set("size", arbor_schema::Value::Int(size)).unwrap();
    file
}
