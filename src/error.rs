//! Error types for binding graph processing
//!
//! User-facing problems with injection declarations are reported as
//! [`Diagnostic`](crate::Diagnostic)s. `CodegenError` covers the cases where
//! processing itself cannot continue: a type that is not yet present in the
//! current round, a malformed request type, an invalid processor option, or
//! an internal invariant violation.

use thiserror::Error;

/// Errors that abort processing of a single element
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// A referenced type has not been generated yet; the element is retried
    /// in a later round
    #[error("Type not present in this round: {type_name}")]
    TypeNotPresent { type_name: String },

    /// A dependency request type could not be classified
    #[error("Invalid request type {type_name}: {reason}")]
    InvalidRequestType {
        type_name: String,
        reason: &'static str,
    },

    /// A processor option carried an unsupported value
    #[error("Processor option -A{key} may only have the values {valid} (case insensitive), found: {found}")]
    InvalidOption {
        key: &'static str,
        valid: String,
        found: String,
    },

    /// An element referenced by id is not part of the program model
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    /// Encoding or decoding a protocol value failed
    #[error("Failed to process {what}: {reason}")]
    Serialization { what: &'static str, reason: String },

    /// Internal error
    #[error("Internal codegen error: {0}")]
    Internal(String),
}

impl CodegenError {
    /// Create a TypeNotPresent error
    #[inline]
    pub fn type_not_present(type_name: impl Into<String>) -> Self {
        Self::TypeNotPresent {
            type_name: type_name.into(),
        }
    }

    /// Create an InvalidRequestType error
    #[inline]
    pub fn invalid_request(type_name: impl ToString, reason: &'static str) -> Self {
        Self::InvalidRequestType {
            type_name: type_name.to_string(),
            reason,
        }
    }

    /// Create an Internal error
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether processing of the element should be deferred to the next round
    #[inline]
    pub fn is_deferrable(&self) -> bool {
        matches!(self, Self::TypeNotPresent { .. })
    }
}

impl From<serde_json::Error> for CodegenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            what: "protocol value",
            reason: err.to_string(),
        }
    }
}

/// Result type alias for codegen operations
pub type Result<T> = std::result::Result<T, CodegenError>;
