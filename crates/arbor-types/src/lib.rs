//! Foundation types for the Arbor persistence layer.
//!
//! Everything in this crate is a pure value: no I/O, no locking, no schema
//! knowledge. Every other Arbor crate depends on `arbor-types`.
//!
//! # Key Types
//!
//! - [`Id`] -- Opaque, immutable object identifier (UUID v7 when generated)
//! - [`ClassBean`] -- (type name, namespace URI) pair naming an object's metaclass
//! - [`ObjectRef`] -- Lazy handle to an object: its `Id` plus its metaclass
//! - [`SingleFeatureKey`] -- (owner, feature) address of a single-valued feature
//! - [`ManyFeatureKey`] -- (owner, feature, position) address of one slot
//! - [`ContainerDescriptor`] -- (container, feature) back-pointer of a contained object
//! - [`RawValue`] -- What a backend stores for one slot: a literal or a reference

pub mod class;
pub mod error;
pub mod id;
pub mod key;
pub mod object;
pub mod value;

pub use class::ClassBean;
pub use error::{TypeError, TypeResult};
pub use id::Id;
pub use key::{ContainerDescriptor, ManyFeatureKey, SingleFeatureKey};
pub use object::ObjectRef;
pub use value::RawValue;
