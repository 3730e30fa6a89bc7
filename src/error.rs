//! Error types for field validation, argument binding and record synthesis.

use thiserror::Error;

use crate::types::ValueKind;

/// Broad classification shared by every error in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value's runtime type does not satisfy a typed rule.
    TypeMismatch,
    /// A sign, size or conversion constraint failed.
    ConstraintViolation,
    /// Read or delete of a field that holds no value.
    FieldUnset,
    /// Constructor arguments do not fit the synthesized signature.
    SignatureMismatch,
    /// Misconfigured rule or record declaration.
    InvalidUsage,
}

/// Errors raised while storing, reading or clearing a single field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("field `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: ValueKind,
    },

    #[error("field `{field}`: expected positive value, got {value}")]
    NotPositive { field: String, value: String },

    #[error("field `{field}`: length {len} exceeds maximum {max_len}")]
    TooLong {
        field: String,
        len: usize,
        max_len: usize,
    },

    #[error("field `{field}`: conversion failed: {message}")]
    ConversionFailed { field: String, message: String },

    #[error("field `{field}`: {message}")]
    Rejected { field: String, message: String },

    #[error("field `{field}` is not set")]
    FieldUnset { field: String },

    #[error("`{record}` has no field `{field}`")]
    UnknownField { record: String, field: String },
}

impl FieldError {
    /// Returns the taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FieldError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            FieldError::NotPositive { .. }
            | FieldError::TooLong { .. }
            | FieldError::ConversionFailed { .. }
            | FieldError::Rejected { .. } => ErrorKind::ConstraintViolation,
            FieldError::FieldUnset { .. } => ErrorKind::FieldUnset,
            FieldError::UnknownField { .. } => ErrorKind::InvalidUsage,
        }
    }

    /// Name of the field the error refers to.
    pub fn field(&self) -> &str {
        match self {
            FieldError::TypeMismatch { field, .. }
            | FieldError::NotPositive { field, .. }
            | FieldError::TooLong { field, .. }
            | FieldError::ConversionFailed { field, .. }
            | FieldError::Rejected { field, .. }
            | FieldError::FieldUnset { field }
            | FieldError::UnknownField { field, .. } => field.as_str(),
        }
    }
}

/// Arguments that do not fit a record's constructor signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("too many positional arguments: expected at most {max}, got {given}")]
    TooManyPositional { max: usize, given: usize },

    #[error("multiple values for argument `{name}`")]
    MultipleValues { name: String },

    #[error("missing a required argument: `{name}`")]
    MissingRequired { name: String },

    #[error("got an unexpected keyword argument `{name}`")]
    UnexpectedKeyword { name: String },

    #[error("arguments must be a JSON object or array, got {actual}")]
    InvalidArguments { actual: String },
}

impl SignatureError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SignatureMismatch
    }
}

/// Configuration errors detected when a record type is synthesized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("invalid field name {name:?} in `{record}`")]
    InvalidFieldName { record: String, name: String },

    #[error("field `{name}` declared twice in `{record}`")]
    DuplicateField { record: String, name: String },

    #[error("a field rule can carry at most one default")]
    MultipleDefaults,

    #[error("default for field `{field}` does not pass its own rule: {source}")]
    InvalidDefault {
        field: String,
        #[source]
        source: FieldError,
    },
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidUsage
    }
}

/// Errors while constructing or bulk-updating a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Field(#[from] FieldError),
}

impl ConstructError {
    /// Returns the taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConstructError::Schema(e) => e.kind(),
            ConstructError::Signature(e) => e.kind(),
            ConstructError::Field(e) => e.kind(),
        }
    }
}
