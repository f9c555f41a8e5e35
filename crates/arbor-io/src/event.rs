//! Events flowing through the pipeline.
//!
//! Readers of documents produce [`RawElement`]s and bare names; the
//! [`SchemaProcessor`](crate::SchemaProcessor) resolves them into
//! [`Element`], [`Attribute`] and [`Reference`], which is also what the
//! backend reader emits directly.

use arbor_types::{ClassBean, Id};

/// A namespace declaration: `xmlns:prefix="uri"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: String,
    pub uri: String,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// A type reference such as `xsi:type="tree:File"`, with its prefix resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeName {
    /// `None` when the prefix is missing or undeclared.
    pub uri: Option<String>,
    pub name: String,
}

/// An element as read from a document, before schema resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawElement {
    /// Local name: a class name at the top level, a feature name below.
    pub name: String,
    pub namespace: Option<Namespace>,
    /// The document identifier (`xmi:id`).
    pub id: Option<String>,
    pub type_name: Option<TypeName>,
    /// Link into another document; such elements are not followed.
    pub href: Option<String>,
}

impl RawElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A resolved object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub id: Id,
    pub class: ClassBean,
    /// Top-level object of the resource.
    pub is_root: bool,
    /// Containment feature of the parent holding this object; `None` for roots.
    pub feature: Option<String>,
}

/// One attribute value, as its canonical literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub owner: Id,
    pub feature: String,
    pub many: bool,
    pub value: String,
}

/// One reference from `owner` to `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub owner: Id,
    pub feature: String,
    pub many: bool,
    pub containment: bool,
    /// Position among the values given together, for ordered cross-references.
    pub index: Option<usize>,
    pub target: Id,
}
