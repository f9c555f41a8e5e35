use std::sync::Arc;

use arbor_backend::Backend;
use arbor_schema::resource::CONTENTS;
use arbor_schema::{Feature, SchemaRegistry};
use arbor_types::{Id, RawValue, SingleFeatureKey};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::event::{Attribute, Element, Reference};
use crate::handler::Handler;

/// Walks a backend from the resource root through containment and emits
/// the same events the document processor would.
///
/// For every object: its start, the containment link from its parent, its
/// attributes and cross-references, then its children, then its end.
pub struct BackendReader {
    backend: Arc<dyn Backend>,
    registry: Arc<SchemaRegistry>,
}

impl BackendReader {
    pub fn new(backend: Arc<dyn Backend>, registry: Arc<SchemaRegistry>) -> Self {
        Self { backend, registry }
    }

    pub fn read(&self, handler: &mut dyn Handler) -> PipelineResult<()> {
        handler.on_initialize()?;
        let roots = self
            .backend
            .all_values_of(&SingleFeatureKey::new(Id::ROOT, CONTENTS))?;
        debug!(roots = roots.len(), "reading backend");
        for root in roots {
            let Some(id) = root.as_reference() else {
                warn!(value = ?root, "resource root holds a literal, skipping");
                continue;
            };
            self.object(id, None, handler)?;
        }
        handler.on_complete()
    }

    fn object(&self, id: Id, parent: Option<(Id, &Feature)>, handler: &mut dyn Handler) -> PipelineResult<()> {
        let bean = self
            .backend
            .metaclass_of(id)?
            .ok_or_else(|| PipelineError::Malformed(format!("object {id} has no metaclass")))?;
        let class = self.registry.class(&bean)?;

        handler.on_start_element(&Element {
            id,
            class: bean,
            is_root: parent.is_none(),
            feature: parent.map(|(_, f)| f.name().to_string()),
        })?;
        if let Some((owner, feature)) = parent {
            handler.on_reference(&Reference {
                owner,
                feature: feature.name().to_string(),
                many: feature.is_many(),
                containment: true,
                index: None,
                target: id,
            })?;
        }

        let (children, plain): (Vec<_>, Vec<_>) = class.features().iter().partition(|f| f.is_containment());
        for feature in plain {
            for (index, value) in self.values(id, feature)?.into_iter().enumerate() {
                match value {
                    RawValue::Literal(value) => handler.on_attribute(&Attribute {
                        owner: id,
                        feature: feature.name().to_string(),
                        many: feature.is_many(),
                        value,
                    })?,
                    RawValue::Reference(target) => handler.on_reference(&Reference {
                        owner: id,
                        feature: feature.name().to_string(),
                        many: feature.is_many(),
                        containment: false,
                        index: feature.is_many().then_some(index),
                        target,
                    })?,
                }
            }
        }
        for feature in children {
            for value in self.values(id, feature)? {
                if let Some(child) = value.as_reference() {
                    self.object(child, Some((id, &**feature)), handler)?;
                }
            }
        }

        handler.on_end_element(id)
    }

    fn values(&self, id: Id, feature: &Feature) -> PipelineResult<Vec<RawValue>> {
        let key = SingleFeatureKey::new(id, feature.name());
        if feature.is_many() {
            Ok(self.backend.all_values_of(&key)?)
        } else {
            Ok(self.backend.value_of(&key)?.into_iter().collect())
        }
    }
}
