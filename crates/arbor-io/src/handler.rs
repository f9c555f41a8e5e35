use arbor_types::Id;

use crate::error::PipelineResult;
use crate::event::{Attribute, Element, RawElement, Reference};

/// Receives the unresolved events of a document reader.
///
/// Attributes and references name a feature of the innermost open element;
/// whether a name is really an attribute or a reference is for the
/// receiver to decide.
pub trait DocumentHandler {
    fn on_initialize(&mut self) -> PipelineResult<()>;

    fn on_start_element(&mut self, element: RawElement) -> PipelineResult<()>;

    /// An XML attribute of the current element.
    fn on_attribute(&mut self, name: &str, value: &str) -> PipelineResult<()>;

    /// Whitespace-separated identifiers, from an `xmi:idref` child.
    fn on_reference(&mut self, name: &str, idrefs: &str) -> PipelineResult<()>;

    /// Text content of the current element.
    fn on_characters(&mut self, text: &str) -> PipelineResult<()>;

    fn on_end_element(&mut self) -> PipelineResult<()>;

    fn on_complete(&mut self) -> PipelineResult<()>;
}

/// Receives resolved events: writers and listeners.
///
/// Every method defaults to doing nothing, so listeners only implement the
/// events they observe.
pub trait Handler {
    fn on_initialize(&mut self) -> PipelineResult<()> {
        Ok(())
    }

    fn on_start_element(&mut self, _element: &Element) -> PipelineResult<()> {
        Ok(())
    }

    fn on_attribute(&mut self, _attribute: &Attribute) -> PipelineResult<()> {
        Ok(())
    }

    fn on_reference(&mut self, _reference: &Reference) -> PipelineResult<()> {
        Ok(())
    }

    fn on_end_element(&mut self, _id: Id) -> PipelineResult<()> {
        Ok(())
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

/// Forwards every event to each handler in order, stopping at the first error.
#[derive(Default)]
pub struct Fanout {
    handlers: Vec<Box<dyn Handler>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Handler for Fanout {
    fn on_initialize(&mut self) -> PipelineResult<()> {
        self.handlers.iter_mut().try_for_each(|h| h.on_initialize())
    }

    fn on_start_element(&mut self, element: &Element) -> PipelineResult<()> {
        self.handlers.iter_mut().try_for_each(|h| h.on_start_element(element))
    }

    fn on_attribute(&mut self, attribute: &Attribute) -> PipelineResult<()> {
        self.handlers.iter_mut().try_for_each(|h| h.on_attribute(attribute))
    }

    fn on_reference(&mut self, reference: &Reference) -> PipelineResult<()> {
        self.handlers.iter_mut().try_for_each(|h| h.on_reference(reference))
    }

    fn on_end_element(&mut self, id: Id) -> PipelineResult<()> {
        self.handlers.iter_mut().try_for_each(|h| h.on_end_element(id))
    }

    fn on_complete(&mut self) -> PipelineResult<()> {
        self.handlers.iter_mut().try_for_each(|h| h.on_complete())
    }
}
