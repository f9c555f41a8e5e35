use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arbor_types::ClassBean;
use parking_lot::RwLock;
use tracing::debug;

use crate::class::ClassInfo;
use crate::error::{SchemaError, SchemaResult};
use crate::feature::Feature;
use crate::resource::{self, RESOURCE_URI};
use crate::schema::{Schema, SchemaDef};

/// Explicit registry of schemas, keyed by namespace URI.
///
/// A registry is owned by a context and passed to whatever needs to resolve
/// classes; there is no process-wide instance.
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaRegistry {
    /// Create a registry holding only the resource schema.
    pub fn new() -> Self {
        let registry = Self {
            schemas: RwLock::new(HashMap::new()),
        };
        let def = resource::resource_schema();
        let schema = Schema::build(&def, &|_: &ClassBean| None)
            .expect("resource schema is well-formed");
        registry
            .schemas
            .write()
            .insert(RESOURCE_URI.to_string(), Arc::new(schema));
        registry
    }

    /// Resolve and register a schema definition.
    pub fn register(&self, def: SchemaDef) -> SchemaResult<Arc<Schema>> {
        if def.uri == RESOURCE_URI {
            return Err(SchemaError::Reserved(def.uri));
        }
        let mut schemas = self.schemas.write();
        if schemas.contains_key(&def.uri) {
            return Err(SchemaError::DuplicateSchema(def.uri));
        }
        let schema = {
            let lookup = |bean: &ClassBean| {
                schemas
                    .get(bean.uri())
                    .and_then(|s| s.class(bean.name()).cloned())
            };
            Arc::new(Schema::build(&def, &lookup)?)
        };
        debug!(uri = %def.uri, classes = def.classes.len(), "schema registered");
        schemas.insert(def.uri, schema.clone());
        Ok(schema)
    }

    /// Register a schema from its JSON form.
    pub fn register_json(&self, json: &str) -> SchemaResult<Arc<Schema>> {
        self.register(SchemaDef::from_json(json)?)
    }

    /// Register a schema from a JSON file.
    pub fn load(&self, path: impl AsRef<Path>) -> SchemaResult<Arc<Schema>> {
        let json = std::fs::read_to_string(path)?;
        self.register_json(&json)
    }

    pub fn unregister(&self, uri: &str) -> SchemaResult<Arc<Schema>> {
        if uri == RESOURCE_URI {
            return Err(SchemaError::Reserved(uri.to_string()));
        }
        self.schemas
            .write()
            .remove(uri)
            .ok_or_else(|| SchemaError::UnknownSchema(uri.to_string()))
    }

    pub fn schema(&self, uri: &str) -> Option<Arc<Schema>> {
        self.schemas.read().get(uri).cloned()
    }

    pub fn schema_by_prefix(&self, prefix: &str) -> Option<Arc<Schema>> {
        self.schemas
            .read()
            .values()
            .find(|s| s.prefix() == prefix)
            .cloned()
    }

    /// All registered schemas, the resource schema included.
    pub fn schemas(&self) -> Vec<Arc<Schema>> {
        let mut all: Vec<_> = self.schemas.read().values().cloned().collect();
        all.sort_by(|a, b| a.uri().cmp(b.uri()));
        all
    }

    pub fn class(&self, bean: &ClassBean) -> SchemaResult<Arc<ClassInfo>> {
        let schemas = self.schemas.read();
        let schema = schemas
            .get(bean.uri())
            .ok_or_else(|| SchemaError::UnknownSchema(bean.uri().to_string()))?;
        schema
            .class(bean.name())
            .cloned()
            .ok_or_else(|| SchemaError::UnknownClass(bean.to_string()))
    }

    pub fn feature(&self, bean: &ClassBean, name: &str) -> SchemaResult<Arc<Feature>> {
        self.class(bean)?
            .feature(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownFeature {
                class: bean.to_string(),
                feature: name.to_string(),
            })
    }

    /// Whether `sub` is `sup` or one of its (transitive) subtypes.
    pub fn is_super_type_of(&self, sup: &ClassBean, sub: &ClassBean) -> bool {
        if sup == sub || *sup == resource::object_class() {
            return true;
        }
        self.class(sub)
            .map(|info| info.ancestors().contains(sup))
            .unwrap_or(false)
    }

    /// Every concrete class that is `bean` or a subtype of it, across all schemas.
    pub fn concrete_subclasses(&self, bean: &ClassBean) -> Vec<ClassBean> {
        let schemas = self.schemas.read();
        let mut found: Vec<ClassBean> = schemas
            .values()
            .flat_map(|s| s.classes())
            .filter(|c| !c.is_abstract())
            .filter(|c| {
                c.bean() == bean
                    || *bean == resource::object_class()
                    || c.ancestors().contains(bean)
            })
            .map(|c| c.bean().clone())
            .collect();
        found.sort();
        found
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.schemas.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{object_class, root_class, CONTENTS};

    const TREE: &str = r#"{
        "uri": "urn:tree",
        "prefix": "tree",
        "classes": [
            { "name": "Node", "abstract": true, "features": [
                { "name": "label", "kind": "attribute", "data_type": "string" }
            ]},
            { "name": "Branch", "supertypes": ["Node"], "features": [
                { "name": "children", "kind": "reference", "target": "Node", "containment": true, "many": true }
            ]},
            { "name": "Leaf", "supertypes": ["Node"], "features": [
                { "name": "weight", "kind": "attribute", "data_type": "int" }
            ]}
        ]
    }"#;

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn starts_with_resource_schema() {
        let registry = SchemaRegistry::new();
        let root = registry.class(&root_class()).unwrap();
        let contents = root.feature(CONTENTS).unwrap();
        assert!(contents.is_containment());
        assert!(contents.is_many());
    }

    #[test]
    fn register_and_lookup() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        assert!(registry.schema("urn:tree").is_some());
        assert_eq!(registry.schema_by_prefix("tree").unwrap().uri(), "urn:tree");
        let leaf = registry.class(&ClassBean::new("Leaf", "urn:tree")).unwrap();
        assert!(leaf.feature("label").is_some());
        assert!(leaf.feature("weight").is_some());
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        assert!(matches!(
            registry.register_json(TREE),
            Err(SchemaError::DuplicateSchema(_))
        ));
    }

    #[test]
    fn resource_schema_is_reserved() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.unregister(RESOURCE_URI),
            Err(SchemaError::Reserved(_))
        ));
    }

    #[test]
    fn unregister_removes_classes() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        registry.unregister("urn:tree").unwrap();
        assert!(matches!(
            registry.class(&ClassBean::new("Leaf", "urn:tree")),
            Err(SchemaError::UnknownSchema(_))
        ));
    }

    #[test]
    fn cross_schema_supertypes_resolve() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        let def = SchemaDef::from_json(
            r#"{ "uri": "urn:ext", "prefix": "ext", "classes": [
                { "name": "Fruit", "supertypes": ["urn:tree#Leaf"] }
            ]}"#,
        )
        .unwrap();
        registry.register(def).unwrap();
        let fruit = ClassBean::new("Fruit", "urn:ext");
        assert!(registry.feature(&fruit, "weight").is_ok());
        assert!(registry.is_super_type_of(&ClassBean::new("Node", "urn:tree"), &fruit));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, TREE).unwrap();
        let registry = SchemaRegistry::new();
        registry.load(&path).unwrap();
        assert!(registry.schema("urn:tree").is_some());
    }

    // -----------------------------------------------------------------------
    // Subtyping
    // -----------------------------------------------------------------------

    #[test]
    fn subtype_queries() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        let node = ClassBean::new("Node", "urn:tree");
        let leaf = ClassBean::new("Leaf", "urn:tree");
        assert!(registry.is_super_type_of(&node, &leaf));
        assert!(!registry.is_super_type_of(&leaf, &node));
        assert!(registry.is_super_type_of(&object_class(), &leaf));
    }

    #[test]
    fn concrete_subclasses_skip_abstract() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        let subs = registry.concrete_subclasses(&ClassBean::new("Node", "urn:tree"));
        assert_eq!(
            subs,
            vec![
                ClassBean::new("Branch", "urn:tree"),
                ClassBean::new("Leaf", "urn:tree"),
            ]
        );
    }

    #[test]
    fn unknown_feature_is_reported() {
        let registry = SchemaRegistry::new();
        registry.register_json(TREE).unwrap();
        assert!(matches!(
            registry.feature(&ClassBean::new("Leaf", "urn:tree"), "missing"),
            Err(SchemaError::UnknownFeature { .. })
        ));
    }
}
