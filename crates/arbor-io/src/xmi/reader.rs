use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::trace;

use super::{HREF, ID, IDREF, WRAPPER, XMI_TYPE, XSI_TYPE};
use crate::error::{PipelineError, PipelineResult};
use crate::event::{Namespace, RawElement, TypeName};
use crate::handler::DocumentHandler;

/// What an open tag turned out to be.
enum Open {
    Wrapper,
    /// An `xmi:idref` child, already reported as a reference.
    IdRef,
    Element,
}

/// Streams an XMI document into a [`DocumentHandler`] without building a tree.
pub struct XmiReader<R: BufRead> {
    reader: Reader<R>,
    /// Declarations in scope, innermost last.
    namespaces: Vec<Namespace>,
    /// Per open tag: its kind and how many declarations it pushed.
    open: Vec<(Open, usize)>,
}

impl<R: BufRead> XmiReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);
        Self {
            reader,
            namespaces: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Read the whole document.
    pub fn read(mut self, handler: &mut dyn DocumentHandler) -> PipelineResult<()> {
        handler.on_initialize()?;
        let mut buf = Vec::new();
        loop {
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let tag = Tag::parse(&e)?;
                    self.start(tag, handler)?;
                }
                Event::Empty(e) => {
                    let tag = Tag::parse(&e)?;
                    self.start(tag, handler)?;
                    self.end(handler)?;
                }
                Event::End(_) => self.end(handler)?,
                Event::Text(e) => {
                    let text = e.unescape()?;
                    let text = text.trim();
                    if !text.is_empty() {
                        handler.on_characters(text)?;
                    }
                }
                Event::CData(e) => {
                    let bytes = e.into_inner();
                    handler.on_characters(utf8(&bytes)?)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        if !self.open.is_empty() {
            return Err(PipelineError::Malformed(format!(
                "document ended with {} unclosed element(s)",
                self.open.len()
            )));
        }
        handler.on_complete()
    }

    fn start(&mut self, tag: Tag, handler: &mut dyn DocumentHandler) -> PipelineResult<()> {
        let declared = tag.declarations.len();
        self.namespaces.extend(tag.declarations);

        if tag.name == WRAPPER {
            self.open.push((Open::Wrapper, declared));
            return Ok(());
        }

        let (prefix, local) = split_qname(&tag.name);
        if let Some(idref) = find(&tag.attributes, IDREF) {
            handler.on_reference(local, idref)?;
            self.open.push((Open::IdRef, declared));
            return Ok(());
        }

        let type_name = find(&tag.attributes, XSI_TYPE)
            .or_else(|| find(&tag.attributes, XMI_TYPE))
            .map(|qname| {
                let (prefix, name) = split_qname(qname);
                TypeName {
                    uri: self.lookup(prefix.unwrap_or("")).map(|ns| ns.uri.clone()),
                    name: name.to_string(),
                }
            });
        let element = RawElement {
            name: local.to_string(),
            namespace: self.lookup(prefix.unwrap_or("")).cloned(),
            id: find(&tag.attributes, ID).map(str::to_string),
            type_name,
            href: find(&tag.attributes, HREF).map(str::to_string),
        };
        trace!(element = %element.name, "start element");
        handler.on_start_element(element)?;

        for (key, value) in &tag.attributes {
            if is_structural(key) {
                continue;
            }
            handler.on_attribute(key, value)?;
        }
        self.open.push((Open::Element, declared));
        Ok(())
    }

    fn end(&mut self, handler: &mut dyn DocumentHandler) -> PipelineResult<()> {
        let (open, declared) = self
            .open
            .pop()
            .ok_or_else(|| PipelineError::Malformed("end tag without start tag".into()))?;
        self.namespaces.truncate(self.namespaces.len().saturating_sub(declared));
        match open {
            Open::Element => handler.on_end_element(),
            Open::Wrapper | Open::IdRef => Ok(()),
        }
    }

    fn lookup(&self, prefix: &str) -> Option<&Namespace> {
        self.namespaces.iter().rev().find(|ns| ns.prefix == prefix)
    }
}

/// An owned start tag.
struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    declarations: Vec<Namespace>,
}

impl Tag {
    fn parse(start: &BytesStart<'_>) -> PipelineResult<Self> {
        let name = utf8(start.name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        let mut declarations = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            if key == "xmlns" {
                declarations.push(Namespace::new("", value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push(Namespace::new(prefix, value));
            } else {
                attributes.push((key, value));
            }
        }
        Ok(Self {
            name,
            attributes,
            declarations,
        })
    }
}

fn find<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Attributes describing the element itself rather than a feature.
fn is_structural(key: &str) -> bool {
    key == HREF || key.starts_with("xmi:") || key.starts_with("xsi:")
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn utf8(bytes: &[u8]) -> PipelineResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| PipelineError::Malformed(format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records raw events as strings.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl DocumentHandler for Trace {
        fn on_initialize(&mut self) -> PipelineResult<()> {
            self.0.push("init".into());
            Ok(())
        }

        fn on_start_element(&mut self, e: RawElement) -> PipelineResult<()> {
            let ns = e.namespace.map(|n| n.uri).unwrap_or_default();
            let ty = e
                .type_name
                .map(|t| format!("{}#{}", t.uri.unwrap_or_default(), t.name))
                .unwrap_or_default();
            self.0.push(format!(
                "start {} ns={ns} id={} type={ty}",
                e.name,
                e.id.unwrap_or_default()
            ));
            Ok(())
        }

        fn on_attribute(&mut self, name: &str, value: &str) -> PipelineResult<()> {
            self.0.push(format!("attr {name}={value}"));
            Ok(())
        }

        fn on_reference(&mut self, name: &str, idrefs: &str) -> PipelineResult<()> {
            self.0.push(format!("ref {name}->{idrefs}"));
            Ok(())
        }

        fn on_characters(&mut self, text: &str) -> PipelineResult<()> {
            self.0.push(format!("text {text}"));
            Ok(())
        }

        fn on_end_element(&mut self) -> PipelineResult<()> {
            self.0.push("end".into());
            Ok(())
        }

        fn on_complete(&mut self) -> PipelineResult<()> {
            self.0.push("complete".into());
            Ok(())
        }
    }

    fn read(doc: &str) -> PipelineResult<Vec<String>> {
        let mut trace = Trace::default();
        XmiReader::new(doc.as_bytes()).read(&mut trace)?;
        Ok(trace.0)
    }

    #[test]
    fn reads_elements_attributes_and_text() {
        let doc = r#"<?xml version="1.0"?>
            <tree:Folder xmlns:tree="urn:tree" xmlns:xmi="http://www.omg.org/XMI" xmi:id="r" name="root">
                <tags>a &amp; b</tags>
                <children xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="tree:File" xmi:id="f"/>
            </tree:Folder>"#;
        assert_eq!(
            read(doc).unwrap(),
            vec![
                "init",
                "start Folder ns=urn:tree id=r type=",
                "attr name=root",
                "start tags ns= id= type=",
                "text a & b",
                "end",
                "start children ns= id=f type=urn:tree#File",
                "end",
                "end",
                "complete",
            ]
        );
    }

    #[test]
    fn wrapper_and_idrefs_are_not_elements() {
        let doc = r#"<xmi:XMI xmlns:xmi="http://www.omg.org/XMI" xmlns:tree="urn:tree">
                <tree:Folder xmi:id="a"><favorites xmi:idref="b"/></tree:Folder>
                <tree:File xmi:id="b"/>
            </xmi:XMI>"#;
        assert_eq!(
            read(doc).unwrap(),
            vec![
                "init",
                "start Folder ns=urn:tree id=a type=",
                "ref favorites->b",
                "end",
                "start File ns=urn:tree id=b type=",
                "end",
                "complete",
            ]
        );
    }

    #[test]
    fn default_namespace_applies() {
        let doc = r#"<Folder xmlns="urn:tree"/>"#;
        assert_eq!(read(doc).unwrap()[1], "start Folder ns=urn:tree id= type=");
    }

    #[test]
    fn truncated_document_fails() {
        let doc = r#"<tree:Folder xmlns:tree="urn:tree"><children>"#;
        assert!(read(doc).is_err());
    }

    #[test]
    fn mismatched_tags_fail() {
        let doc = r#"<tree:Folder xmlns:tree="urn:tree"></tree:File>"#;
        assert!(matches!(read(doc), Err(PipelineError::Xml(_))));
    }
}
