use thiserror::Error;

/// Errors produced while loading schemas or converting values.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No schema registered under this namespace URI.
    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    /// The class is not defined by its schema.
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// The class has no feature with this name.
    #[error("class {class} has no feature '{feature}'")]
    UnknownFeature { class: String, feature: String },

    /// A schema with the same URI is already registered.
    #[error("schema already registered: {0}")]
    DuplicateSchema(String),

    /// Two features of the same class share a name.
    #[error("duplicate feature '{feature}' in class {class}")]
    DuplicateFeature { class: String, feature: String },

    /// The supertype graph loops back on itself.
    #[error("inheritance cycle through {0}")]
    InheritanceCycle(String),

    /// The schema URI is reserved and cannot be replaced or removed.
    #[error("reserved schema: {0}")]
    Reserved(String),

    /// A literal could not be parsed as the expected data type.
    #[error("invalid {data_type} literal: '{literal}'")]
    InvalidLiteral { data_type: String, literal: String },

    /// A value does not match the feature's data type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for schema results.
pub type SchemaResult<T> = Result<T, SchemaError>;
