use arbor_backend::BackendError;
use arbor_schema::SchemaError;
use thiserror::Error;

/// Errors that abort a migration.
///
/// Content-level anomalies (unknown features, attributes without a value,
/// types that do not fit their reference) are logged and skipped by the
/// processor; they never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Structure the pipeline cannot recover from.
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A background writer failed or panicked.
    #[error("writer worker failed: {0}")]
    Worker(String),
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;
