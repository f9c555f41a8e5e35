use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arbor_types::ClassBean;
use serde::{Deserialize, Serialize};

use crate::class::{ClassDef, ClassInfo};
use crate::error::{SchemaError, SchemaResult};
use crate::feature::{qualify, Feature};

/// Serialized form of a schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// Namespace URI identifying the schema.
    pub uri: String,
    /// Preferred document prefix (`xmlns:<prefix>`).
    pub prefix: String,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
}

impl SchemaDef {
    pub fn new(uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            prefix: prefix.into(),
            classes: Vec::new(),
        }
    }

    pub fn class(mut self, class: ClassDef) -> Self {
        self.classes.push(class);
        self
    }

    pub fn from_json(json: &str) -> SchemaResult<Self> {
        serde_json::from_str(json).map_err(|e| SchemaError::Serialization(e.to_string()))
    }
}

/// A resolved schema: immutable once built.
#[derive(Debug)]
pub struct Schema {
    uri: String,
    prefix: String,
    classes: HashMap<String, Arc<ClassInfo>>,
    order: Vec<String>,
}

impl Schema {
    /// Resolve a definition. Supertypes living in other schemas are looked
    /// up through `external`.
    pub(crate) fn build(
        def: &SchemaDef,
        external: &dyn Fn(&ClassBean) -> Option<Arc<ClassInfo>>,
    ) -> SchemaResult<Self> {
        let mut builder = Builder {
            def,
            external,
            defs: def.classes.iter().map(|c| (c.name.as_str(), c)).collect(),
            built: HashMap::new(),
            visiting: HashSet::new(),
        };
        for class in &def.classes {
            builder.resolve(&class.name)?;
        }
        Ok(Self {
            uri: def.uri.clone(),
            prefix: def.prefix.clone(),
            order: def.classes.iter().map(|c| c.name.clone()).collect(),
            classes: builder.built,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn class(&self, name: &str) -> Option<&Arc<ClassInfo>> {
        self.classes.get(name)
    }

    /// Classes in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassInfo>> {
        self.order.iter().filter_map(|n| self.classes.get(n))
    }
}

struct Builder<'a> {
    def: &'a SchemaDef,
    external: &'a dyn Fn(&ClassBean) -> Option<Arc<ClassInfo>>,
    defs: HashMap<&'a str, &'a ClassDef>,
    built: HashMap<String, Arc<ClassInfo>>,
    visiting: HashSet<String>,
}

impl Builder<'_> {
    fn resolve(&mut self, name: &str) -> SchemaResult<Arc<ClassInfo>> {
        if let Some(info) = self.built.get(name) {
            return Ok(info.clone());
        }
        let def = *self
            .defs
            .get(name)
            .ok_or_else(|| SchemaError::UnknownClass(format!("{}#{}", self.def.uri, name)))?;
        if !self.visiting.insert(name.to_string()) {
            return Err(SchemaError::InheritanceCycle(name.to_string()));
        }

        let bean = ClassBean::new(name, &self.def.uri);
        let mut supertypes = Vec::new();
        let mut ancestors = HashSet::new();
        let mut features: Vec<Arc<Feature>> = Vec::new();

        for raw in &def.supertypes {
            let super_bean = qualify(raw, &self.def.uri);
            let super_info = if super_bean.uri() == self.def.uri {
                self.resolve(super_bean.name())?
            } else {
                (self.external)(&super_bean)
                    .ok_or_else(|| SchemaError::UnknownClass(super_bean.to_string()))?
            };
            ancestors.extend(super_info.ancestors().iter().cloned());
            ancestors.insert(super_bean.clone());
            for inherited in super_info.features() {
                if !features.iter().any(|f| f.name() == inherited.name()) {
                    features.push(inherited.clone());
                }
            }
            supertypes.push(super_bean);
        }

        for feature_def in &def.features {
            if features.iter().any(|f| f.name() == feature_def.name) {
                return Err(SchemaError::DuplicateFeature {
                    class: bean.to_string(),
                    feature: feature_def.name.clone(),
                });
            }
            features.push(Arc::new(feature_def.resolve(&self.def.uri)));
        }

        self.visiting.remove(name);
        let info = Arc::new(ClassInfo::new(
            bean,
            def.is_abstract,
            supertypes,
            ancestors,
            features,
        ));
        self.built.insert(name.to_string(), info.clone());
        Ok(info)
    }
}
