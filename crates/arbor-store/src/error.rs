use arbor_backend::BackendError;
use arbor_schema::SchemaError;
use arbor_types::Id;
use thiserror::Error;

/// Errors produced by stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The feature does not belong to the object's class.
    #[error("class {class} has no feature '{feature}'")]
    InvalidFeature { class: String, feature: String },

    /// An index outside the feature's bounds.
    #[error("index {index} out of bounds for size {size}")]
    IndexOutOfBounds { index: usize, size: usize },

    /// A value that does not fit the feature.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// An operation that does not apply to the feature, or a missing index.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A mutation reached a read-only store.
    #[error("store is read-only")]
    ReadOnly,

    /// The store or its backend has been closed.
    #[error("store is closed")]
    Closed,

    /// The backend cannot perform this operation.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// A reference points at an object with no recorded metaclass.
    #[error("unknown object {0}")]
    UnknownObject(Id),

    #[error("backend error: {0}")]
    Backend(#[source] BackendError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl StoreError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

impl From<BackendError> for StoreError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Closed => Self::Closed,
            BackendError::Unsupported(op) => Self::Unsupported(op),
            BackendError::IndexOutOfBounds { index, size } => Self::IndexOutOfBounds { index, size },
            other => Self::Backend(other),
        }
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
