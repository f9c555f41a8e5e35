//! Backend layer for Arbor.
//!
//! A [`Backend`] is the storage-facing contract every higher layer is written
//! against: container and metaclass records, single-valued feature values,
//! multi-valued feature slots, instance enumeration and lifecycle.
//!
//! # Key Types
//!
//! - [`Backend`] -- The capability trait
//! - [`TransientBackend`] -- In-memory backend for unmapped objects
//! - [`MappedBackend`] -- Backend over any [`KvEngine`], with a [`ManyMapping`]
//! - [`MemoryEngine`] / [`FileEngine`] -- Ordered key-value engines
//! - [`BackendConfig`] / [`Descriptor`] -- Configuration and the persisted descriptor
//! - [`BackendRegistry`] -- Explicit registry of [`BackendFactory`]s
//!
//! # Design Rules
//!
//! 1. Every operation after `close()` fails with [`BackendError::Closed`].
//! 2. `metaclass_for` only ever writes once per id.
//! 3. Multi-valued positions are always dense: `0..size`.
//! 4. Engine failures surface as [`BackendError`]; nothing is swallowed.

pub mod codec;
pub mod config;
#[cfg(test)]
mod conformance;
pub mod engine;
pub mod error;
pub mod factory;
pub mod mapped;
pub mod memory;
pub mod record;
pub mod traits;

pub use config::{BackendConfig, Descriptor, EngineKind, ManyMapping};
pub use engine::{FileEngine, KvEngine, MemoryEngine};
pub use error::{BackendError, BackendResult};
pub use factory::{BackendFactory, BackendRegistry, FileBackendFactory, MemoryBackendFactory};
pub use mapped::MappedBackend;
pub use memory::TransientBackend;
pub use record::Record;
pub use traits::Backend;
