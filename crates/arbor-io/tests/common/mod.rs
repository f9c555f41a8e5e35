//! Schema and documents shared by the pipeline tests.

#![allow(dead_code)]

use std::sync::Arc;

use arbor_backend::{Backend, ManyMapping, MappedBackend, MemoryEngine, TransientBackend};
use arbor_schema::SchemaRegistry;

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

/// A folder with nested children, a contained primary file, cross-references
/// (one of them forward) and multi-valued text.
pub const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xmi:XMI xmi:version="2.0" xmlns:xmi="http://www.omg.org/XMI"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xmlns:tree="urn:test:tree">
  <tree:Folder xmi:id="root" name="home" favorites="readme photo">
    <children xsi:type="tree:File" xmi:id="readme" name="README" size="120" kind="TEXT"/>
    <children xsi:type="tree:Folder" xmi:id="pics" name="pics">
      <children xsi:type="tree:File" xmi:id="photo" name="photo.png" size="4096" kind="BINARY"/>
      <tags>images</tags>
      <tags>shared</tags>
    </children>
    <primary xsi:type="tree:File" xmi:id="main" name="main.rs"/>
    <tags>top</tags>
  </tree:Folder>
  <tree:File xmi:id="loose" name="loose.txt"/>
</xmi:XMI>
"#;

pub fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    registry.register_json(TREE).unwrap();
    Arc::new(registry)
}

pub fn backends() -> Vec<Arc<dyn Backend>> {
    vec![
        Arc::new(TransientBackend::new()),
        Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Indices)),
        Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Lists)),
        Arc::new(MappedBackend::new(MemoryEngine::new(), ManyMapping::Arrays)),
    ]
}

/// Records in a stable order, so two backends can be compared.
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
