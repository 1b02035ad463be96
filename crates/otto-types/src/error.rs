//! Validation errors for runtime-validated record types (§9 Design Notes).

use thiserror::Error;

/// Error produced when a record fails a field-level invariant at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("{what} out of bounds: {reason}")]
    OutOfBounds { what: &'static str, reason: String },
}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
