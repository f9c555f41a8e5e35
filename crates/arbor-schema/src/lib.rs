//! Schema model and registry for Arbor.
//!
//! A schema is a namespace of classes; a class is a named set of features.
//! Schemas are registered into an explicit [`SchemaRegistry`] owned by the
//! caller's context. Registration precomputes, for every class, the full
//! feature table including inherited features so that feature access never
//! walks the inheritance graph at run time.
//!
//! # Key Types
//!
//! - [`SchemaDef`] / [`ClassDef`] / [`FeatureDef`] -- serde-loadable definitions
//! - [`Schema`] / [`ClassInfo`] / [`Feature`] -- resolved, immutable forms
//! - [`DataType`] / [`Value`] -- attribute types and typed feature values
//! - [`SchemaRegistry`] -- register/unregister/lookup, subtype queries
//!
//! # Design Rules
//!
//! 1. Resolved schema objects are immutable and shared behind `Arc`.
//! 2. Every registry starts with the resource schema (`arbor:resource`).
//! 3. Literal conversion is owned by [`DataType`]; nothing else formats values.

pub mod class;
pub mod data_type;
pub mod error;
pub mod feature;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod value;

pub use class::{ClassDef, ClassInfo};
pub use data_type::DataType;
pub use error::{SchemaError, SchemaResult};
pub use feature::{Feature, FeatureDef, FeatureKind};
pub use registry::SchemaRegistry;
pub use schema::{Schema, SchemaDef};
pub use value::Value;
