//! Shared schema and helpers for store tests.

use std::sync::Arc;

use arbor_backend::{Backend, ManyMapping, MappedBackend, MemoryEngine, TransientBackend};
use arbor_schema::{Feature, SchemaRegistry};
use arbor_types::{ClassBean, Id, ObjectRef};

use crate::direct::DirectStore;

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

pub fn class(name: &str) -> ClassBean {
    ClassBean::new(name, TREE_URI)
}

pub fn feature(registry: &SchemaRegistry, class_name: &str, name: &str) -> Arc<Feature> {
    registry.feature(&class(class_name), name).unwrap()
}

pub fn folder() -> ObjectRef {
    ObjectRef::new(Id::generate(), class("Folder"))
}

pub fn file() -> ObjectRef {
    ObjectRef::new(Id::generate(), class("File"))
}

/// Every backend flavour a store must behave identically on.
pub fn backends() -> Vec<Arc<dyn Backend>> {
    vec![
        Arc::new(TransientBackend::new()),
        Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices)),
        Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Lists)),
        Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Arrays)),
    ]
}

pub fn direct(backend: Arc<dyn Backend>) -> DirectStore {
    DirectStore::new(backend, registry())
}

/// Backend records in a stable order, for comparing two stores.
pub fn sorted_records(backend: &dyn Backend) -> Vec<String> {
    let mut records: Vec<String> = backend
        .records()
        .unwrap()
        .into_iter()
        .map(|r| format!("{r:?}"))
        .collect();
    records.sort();
    records
}
