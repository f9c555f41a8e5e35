//! Streaming import, export and migration for Arbor.
//!
//! Models move between XMI documents and backends as a stream of events.
//! A reader produces them, a [`SchemaProcessor`] resolves XMI names against
//! the schema registry, listeners observe them and each [`Writer`] groups
//! multi-valued features into batches for its [`Sink`].
//!
//! # Key Types
//!
//! - [`Migrator`] -- Connects one source to listeners and writers
//! - [`XmiReader`] / [`XmiWriter`] -- XMI 2.0 documents, plain or zstd
//! - [`BackendReader`] / [`BackendWriter`] -- Backend contents as events
//! - [`Writer`] -- Accumulates multi-valued features into [`Batch`]es
//! - [`WorkerPool`] -- Parallel batch writes, ordered per feature
//!
//! # Design Rules
//!
//! 1. A child's element is emitted before the containment reference that
//!    links it, and the container is written before the link.
//! 2. Values of a feature written together keep their document order.
//! 3. Unknown features and invalid values are logged and skipped; broken
//!    framing aborts the migration.

pub mod backend_reader;
pub mod backend_writer;
pub mod compress;
pub mod error;
pub mod event;
pub mod handler;
pub mod listener;
pub mod migrator;
pub mod pool;
pub mod processor;
pub mod writer;
pub mod xmi;

pub use backend_reader::BackendReader;
pub use backend_writer::BackendWriter;
pub use compress::{is_compressed, open_input};
pub use error::{PipelineError, PipelineResult};
pub use event::{Attribute, Element, Namespace, RawElement, Reference, TypeName};
pub use handler::{DocumentHandler, Fanout, Handler};
pub use listener::{
    CountingListener, CountingReader, EventCounts, LoggingListener, ProgressListener, TimerListener,
};
pub use migrator::{copy_backend, Migrator, SharedBuffer, DEFAULT_COMPRESSION_LEVEL};
pub use pool::WorkerPool;
pub use processor::SchemaProcessor;
pub use writer::{Batch, BatchValues, Sink, Writer};
pub use xmi::{XmiOutput, XmiReader, XmiWriter};
