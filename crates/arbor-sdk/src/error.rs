use arbor_backend::BackendError;
use arbor_schema::SchemaError;
use arbor_store::StoreError;
use arbor_types::Id;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    /// The resource, or the resource an object belongs to, has been closed.
    #[error("resource is closed")]
    Closed,

    #[error("class {0} is abstract")]
    AbstractClass(String),

    #[error("object {0} is not a root of this resource")]
    NotARoot(Id),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("backend error: {0}")]
    Backend(#[source] BackendError),
}

impl From<StoreError> for SdkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Closed => Self::Closed,
            other => Self::Store(other),
        }
    }
}

impl From<BackendError> for SdkError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Closed => Self::Closed,
            other => Self::Backend(other),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
