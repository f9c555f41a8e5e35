use thiserror::Error;

/// Errors produced by backends and engines.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend has been closed.
    #[error("backend is closed")]
    Closed,

    /// The backend cannot perform this operation at all.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// A slot position outside `0..size` (or `0..=size` for insertion).
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds { index: usize, size: usize },

    /// A stored key or record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The configuration or the persisted descriptor is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No factory registered under this name.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn unsupported(operation: &str) -> Self {
        Self::Unsupported(operation.to_string())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// Convenience alias for backend results.
pub type BackendResult<T> = Result<T, BackendError>;
