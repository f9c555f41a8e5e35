use std::io::{self, BufWriter, Write};
use std::sync::Arc;

use arbor_schema::resource::RESOURCE_URI;
use arbor_schema::SchemaRegistry;
use arbor_types::{ClassBean, Id};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use super::{ID, IDREF, WRAPPER, XMI_PREFIX, XMI_URI, XMI_VERSION, XSI_PREFIX, XSI_TYPE, XSI_URI};
use crate::error::{PipelineError, PipelineResult};
use crate::event::Element;
use crate::writer::{Batch, BatchValues, Sink};

/// Byte destination of an XMI document, optionally zstd-compressed.
pub enum XmiOutput {
    Plain(BufWriter<Box<dyn Write>>),
    Zstd(zstd::Encoder<'static, Box<dyn Write>>),
}

impl XmiOutput {
    pub fn plain(inner: impl Write + 'static) -> Self {
        Self::Plain(BufWriter::new(Box::new(inner)))
    }

    pub fn compressed(inner: impl Write + 'static, level: i32) -> io::Result<Self> {
        Ok(Self::Zstd(zstd::Encoder::new(Box::new(inner) as Box<dyn Write>, level)?))
    }

    /// Flush everything, ending the compressed frame if any.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Plain(mut w) => w.flush(),
            Self::Zstd(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for XmiOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Zstd(w) => w.flush(),
        }
    }
}

/// Serializes the event stream as XMI.
///
/// Start tags are held open until the first child is written, so that
/// single-valued features become XML attributes. Multi-valued attributes
/// become one child element per value; cross-references that arrive after
/// the tag is closed become `xmi:idref` children. Containment is expressed
/// by nesting alone.
pub struct XmiWriter {
    xml: Option<quick_xml::Writer<XmiOutput>>,
    registry: Arc<SchemaRegistry>,
    pending: Option<BytesStart<'static>>,
    open: Vec<(Id, String)>,
}

impl XmiWriter {
    pub fn new(output: XmiOutput, registry: Arc<SchemaRegistry>) -> PipelineResult<Self> {
        let mut xml = quick_xml::Writer::new_with_indent(output, b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut wrapper = BytesStart::new(WRAPPER);
        wrapper.push_attribute(("xmi:version", XMI_VERSION));
        wrapper.push_attribute((format!("xmlns:{XMI_PREFIX}").as_str(), XMI_URI));
        wrapper.push_attribute((format!("xmlns:{XSI_PREFIX}").as_str(), XSI_URI));
        for schema in registry.schemas() {
            if schema.uri() != RESOURCE_URI {
                wrapper.push_attribute((format!("xmlns:{}", schema.prefix()).as_str(), schema.uri()));
            }
        }
        xml.write_event(Event::Start(wrapper))?;

        Ok(Self {
            xml: Some(xml),
            registry,
            pending: None,
            open: Vec::new(),
        })
    }

    fn xml(&mut self) -> PipelineResult<&mut quick_xml::Writer<XmiOutput>> {
        self.xml
            .as_mut()
            .ok_or_else(|| PipelineError::Malformed("document already completed".into()))
    }

    fn qualified(&self, class: &ClassBean) -> PipelineResult<String> {
        let schema = self
            .registry
            .schema(class.uri())
            .ok_or_else(|| arbor_schema::SchemaError::UnknownSchema(class.uri().to_string()))?;
        Ok(format!("{}:{}", schema.prefix(), class.name()))
    }

    /// Write the held start tag, if any.
    fn open_pending(&mut self) -> PipelineResult<()> {
        if let Some(tag) = self.pending.take() {
            self.xml()?.write_event(Event::Start(tag))?;
        }
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> PipelineResult<()> {
        let xml = self.xml()?;
        xml.write_event(Event::Start(BytesStart::new(name)))?;
        xml.write_event(Event::Text(BytesText::new(text)))?;
        xml.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn idref_element(&mut self, name: &str, target: Id) -> PipelineResult<()> {
        let mut tag = BytesStart::new(name);
        tag.push_attribute((IDREF, target.to_string().as_str()));
        self.xml()?.write_event(Event::Empty(tag))?;
        Ok(())
    }
}

impl Sink for XmiWriter {
    fn start_element(&mut self, element: &Element) -> PipelineResult<()> {
        self.open_pending()?;
        let qualified = self.qualified(&element.class)?;
        let (name, mut tag) = match &element.feature {
            Some(feature) if !element.is_root => {
                let mut tag = BytesStart::new(feature.clone());
                tag.push_attribute((XSI_TYPE, qualified.as_str()));
                (feature.clone(), tag)
            }
            _ => (qualified.clone(), BytesStart::new(qualified)),
        };
        tag.push_attribute((ID, element.id.to_string().as_str()));
        self.pending = Some(tag);
        self.open.push((element.id, name));
        Ok(())
    }

    fn write(&mut self, batch: Batch) -> PipelineResult<()> {
        if batch.values.is_containment() {
            return Ok(());
        }
        if self.open.last().map(|(id, _)| *id) != Some(batch.owner) {
            return Err(PipelineError::Malformed(format!(
                "value of '{}' arrived outside its owner {}",
                batch.feature, batch.owner
            )));
        }
        match batch.values {
            BatchValues::Literals(values) => {
                if let (false, Some(tag), Some(value)) = (batch.many, self.pending.as_mut(), values.first()) {
                    tag.push_attribute((batch.feature.as_str(), value.as_str()));
                    return Ok(());
                }
                self.open_pending()?;
                for value in &values {
                    self.text_element(&batch.feature, value)?;
                }
                Ok(())
            }
            BatchValues::References { targets, .. } => {
                if let Some(tag) = self.pending.as_mut() {
                    let joined = targets.iter().map(Id::to_string).collect::<Vec<_>>().join(" ");
                    tag.push_attribute((batch.feature.as_str(), joined.as_str()));
                    return Ok(());
                }
                for target in targets {
                    self.idref_element(&batch.feature, target)?;
                }
                Ok(())
            }
        }
    }

    fn end_element(&mut self, id: Id) -> PipelineResult<()> {
        let Some((open_id, name)) = self.open.pop() else {
            return Err(PipelineError::Malformed(format!("end of {id} without a start")));
        };
        debug_assert_eq!(open_id, id);
        match self.pending.take() {
            Some(tag) => self.xml()?.write_event(Event::Empty(tag))?,
            None => self.xml()?.write_event(Event::End(BytesEnd::new(name)))?,
        }
        Ok(())
    }

    fn complete(&mut self) -> PipelineResult<()> {
        self.xml()?.write_event(Event::End(BytesEnd::new(WRAPPER)))?;
        if let Some(xml) = self.xml.take() {
            xml.into_inner().finish()?;
        }
        debug!("document written");
        Ok(())
    }

    fn requires_end_before_flush(&self) -> bool {
        true
    }
}
