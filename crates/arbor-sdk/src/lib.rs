//! Object-level API for Arbor.
//!
//! Applications create objects in a [`Context`], work on them by feature
//! name through [`PersistentObject`] handles and persist them by adding
//! them to a [`Resource`]. Until then an object lives in the context's
//! transient store; attaching it moves its data, and the data of everything
//! it contains, into the resource's backend.
//!
//! # Key Types
//!
//! - [`Context`] -- Schema and backend registries, transient store, identity map
//! - [`Resource`] -- Roots and their contents in one decorated store
//! - [`ResourceOptions`] -- Backend configuration plus store options, from TOML
//! - [`PersistentObject`] -- A handle on one object
//!
//! # Design Rules
//!
//! 1. One live state per object id; every handle on an id sees the same
//!    binding.
//! 2. A contained object is moved into its owner's store before it is linked.
//! 3. Once a resource is closed, its objects fail with [`SdkError::Closed`].

pub mod context;
pub mod error;
pub mod object;
pub mod options;
pub mod resource;

#[cfg(test)]
pub(crate) mod fixtures;

pub use context::Context;
pub use error::{SdkError, SdkResult};
pub use object::PersistentObject;
pub use options::ResourceOptions;
pub use resource::Resource;

pub use arbor_schema::{SchemaRegistry, Value};
pub use arbor_store::StoreOption;
pub use arbor_types::{ClassBean, Id};
