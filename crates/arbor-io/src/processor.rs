use std::sync::Arc;

use arbor_schema::{ClassInfo, Feature, FeatureKind, SchemaError, SchemaRegistry};
use arbor_types::{ClassBean, Id};
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::event::{Attribute, Element, RawElement, Reference, TypeName};
use crate::handler::{DocumentHandler, Handler};

enum Frame {
    /// An object; its XML attributes and children are its features.
    Object { id: Id, class: Arc<ClassInfo> },
    /// An element standing for one attribute value, waiting for its text.
    Value { owner: Id, feature: Arc<Feature>, received: bool },
    /// A subtree that is not imported.
    Skipped,
}

/// Resolves document events against the schema registry.
///
/// Keeps one frame per open element. The first element is a root object
/// and must carry a namespace; every nested element names a feature of the
/// enclosing object. Attribute features wait for character data, containment
/// features open a child object and link it to its parent. Anything that
/// does not fit the schema is logged and skipped with its subtree.
pub struct SchemaProcessor<H: Handler> {
    registry: Arc<SchemaRegistry>,
    next: H,
    frames: Vec<Frame>,
}

impl<H: Handler> SchemaProcessor<H> {
    pub fn new(registry: Arc<SchemaRegistry>, next: H) -> Self {
        Self {
            registry,
            next,
            frames: Vec::new(),
        }
    }

    pub fn into_inner(self) -> H {
        self.next
    }

    fn current(&self) -> Option<(Id, Arc<ClassInfo>)> {
        match self.frames.last() {
            Some(Frame::Object { id, class }) => Some((*id, class.clone())),
            _ => None,
        }
    }

    fn start_root(&mut self, element: RawElement) -> PipelineResult<()> {
        let namespace = element.namespace.ok_or_else(|| {
            PipelineError::Malformed(format!("root element '{}' has no namespace", element.name))
        })?;
        let schema = self
            .registry
            .schema(&namespace.uri)
            .ok_or_else(|| SchemaError::UnknownSchema(namespace.uri.clone()))?;

        let bean = match &element.type_name {
            Some(TypeName { uri, name }) => {
                ClassBean::new(name.clone(), uri.clone().unwrap_or_else(|| namespace.uri.clone()))
            }
            None => ClassBean::new(element.name.clone(), schema.uri()),
        };
        let class = self.registry.class(&bean)?;
        if class.is_abstract() {
            return Err(PipelineError::Malformed(format!("root class {bean} is abstract")));
        }

        let id = element.id.as_deref().map_or_else(Id::generate, Id::from_raw);
        self.next.on_start_element(&Element {
            id,
            class: bean,
            is_root: true,
            feature: None,
        })?;
        self.frames.push(Frame::Object { id, class });
        Ok(())
    }

    fn start_feature(&mut self, parent: Id, parent_class: &ClassInfo, element: RawElement) -> PipelineResult<()> {
        let Some(feature) = parent_class.feature(&element.name).cloned() else {
            warn!(class = %parent_class.bean(), feature = %element.name, "unknown feature, skipping element");
            self.frames.push(Frame::Skipped);
            return Ok(());
        };
        if let Some(href) = &element.href {
            warn!(feature = %element.name, href = %href, "external references are not followed");
            self.frames.push(Frame::Skipped);
            return Ok(());
        }

        let (target, containment) = match feature.kind() {
            FeatureKind::Attribute(_) => {
                self.frames.push(Frame::Value {
                    owner: parent,
                    feature,
                    received: false,
                });
                return Ok(());
            }
            FeatureKind::Reference { target, containment } => (target.clone(), *containment),
        };
        if !containment {
            warn!(feature = %element.name, "cross-reference without identifiers, skipping element");
            self.frames.push(Frame::Skipped);
            return Ok(());
        }

        let Some(class) = self.resolve_child(&element, &target) else {
            self.frames.push(Frame::Skipped);
            return Ok(());
        };
        let id = element.id.as_deref().map_or_else(Id::generate, Id::from_raw);
        self.next.on_start_element(&Element {
            id,
            class: class.bean().clone(),
            is_root: false,
            feature: Some(feature.name().to_string()),
        })?;
        self.next.on_reference(&Reference {
            owner: parent,
            feature: feature.name().to_string(),
            many: feature.is_many(),
            containment: true,
            index: None,
            target: id,
        })?;
        self.frames.push(Frame::Object { id, class });
        Ok(())
    }

    /// The class of a contained element: its declared type if it fits the
    /// reference, the reference target otherwise.
    fn resolve_child(&self, element: &RawElement, target: &ClassBean) -> Option<Arc<ClassInfo>> {
        let bean = match &element.type_name {
            Some(TypeName { uri, name }) => {
                let uri = uri
                    .clone()
                    .or_else(|| element.namespace.as_ref().map(|ns| ns.uri.clone()))
                    .unwrap_or_else(|| target.uri().to_string());
                ClassBean::new(name.clone(), uri)
            }
            None => target.clone(),
        };
        if !self.registry.is_super_type_of(target, &bean) {
            warn!(class = %bean, expected = %target, "type does not fit the reference, skipping element");
            return None;
        }
        match self.registry.class(&bean) {
            Ok(class) if class.is_abstract() => {
                warn!(class = %bean, "abstract class without a concrete type, skipping element");
                None
            }
            Ok(class) => Some(class),
            Err(e) => {
                warn!(error = %e, "unresolved element type, skipping element");
                None
            }
        }
    }

    fn attribute(&mut self, owner: Id, feature: &Feature, value: &str) -> PipelineResult<()> {
        let Some(data_type) = feature.data_type() else {
            return Ok(());
        };
        match data_type.normalize(value) {
            Ok(literal) => self.next.on_attribute(&Attribute {
                owner,
                feature: feature.name().to_string(),
                many: feature.is_many(),
                value: literal,
            }),
            Err(e) => {
                warn!(feature = %feature.name(), error = %e, "invalid attribute value, skipping");
                Ok(())
            }
        }
    }

    fn references(&mut self, owner: Id, feature: &Feature, idrefs: &str) -> PipelineResult<()> {
        let ordered = feature.is_many() && !feature.is_containment();
        for (index, idref) in idrefs.split_whitespace().enumerate() {
            self.next.on_reference(&Reference {
                owner,
                feature: feature.name().to_string(),
                many: feature.is_many(),
                containment: feature.is_containment(),
                index: ordered.then_some(index),
                target: Id::from_raw(idref),
            })?;
        }
        Ok(())
    }
}

impl<H: Handler> DocumentHandler for SchemaProcessor<H> {
    fn on_initialize(&mut self) -> PipelineResult<()> {
        self.next.on_initialize()
    }

    fn on_start_element(&mut self, element: RawElement) -> PipelineResult<()> {
        match self.frames.last() {
            None => self.start_root(element),
            Some(Frame::Object { id, class }) => {
                let (id, class) = (*id, class.clone());
                self.start_feature(id, &class, element)
            }
            Some(Frame::Value { feature, .. }) => {
                warn!(feature = %feature.name(), element = %element.name, "element inside an attribute value, skipping");
                self.frames.push(Frame::Skipped);
                Ok(())
            }
            Some(Frame::Skipped) => {
                self.frames.push(Frame::Skipped);
                Ok(())
            }
        }
    }

    fn on_attribute(&mut self, name: &str, value: &str) -> PipelineResult<()> {
        let Some((owner, class)) = self.current() else {
            return Ok(());
        };
        match class.feature(name).cloned() {
            Some(feature) if feature.is_attribute() => self.attribute(owner, &feature, value),
            // An XML attribute holding identifiers.
            Some(feature) => self.references(owner, &feature, value),
            None => {
                warn!(class = %class.bean(), feature = %name, "unknown feature, skipping attribute");
                Ok(())
            }
        }
    }

    fn on_reference(&mut self, name: &str, idrefs: &str) -> PipelineResult<()> {
        let Some((owner, class)) = self.current() else {
            return Ok(());
        };
        match class.feature(name).cloned() {
            Some(feature) if feature.is_reference() => self.references(owner, &feature, idrefs),
            Some(feature) => {
                debug!(feature = %name, "reference names an attribute, reading it as a value");
                self.attribute(owner, &feature, idrefs)
            }
            None => {
                warn!(class = %class.bean(), feature = %name, "unknown feature, skipping reference");
                Ok(())
            }
        }
    }

    fn on_characters(&mut self, text: &str) -> PipelineResult<()> {
        let (owner, feature) = match self.frames.last_mut() {
            Some(Frame::Value {
                owner,
                feature,
                received,
            }) if !*received => {
                *received = true;
                (*owner, feature.clone())
            }
            _ => {
                debug!(text = %text, "ignoring characters");
                return Ok(());
            }
        };
        self.attribute(owner, &feature, text)
    }

    fn on_end_element(&mut self) -> PipelineResult<()> {
        match self.frames.pop() {
            Some(Frame::Object { id, .. }) => self.next.on_end_element(id),
            Some(Frame::Value {
                feature,
                received: false,
                ..
            }) => {
                warn!(feature = %feature.name(), "attribute without a value, ignoring it");
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(PipelineError::Malformed("unbalanced end of element".into())),
        }
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        if !self.frames.is_empty() {
            return Err(PipelineError::Malformed(format!(
                "{} element(s) left open at end of document",
                self.frames.len()
            )));
        }
        self.next.on_complete()
    }
}
