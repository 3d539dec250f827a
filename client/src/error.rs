use thiserror::Error;

use replica_shared::RemoteError;

/// Missing or unusable arguments, detected before anything is emitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `retrieve_one` was called without an identifier
    #[error("An entity ID is required")]
    MissingId,

    /// A field map was required but absent (or not an object)
    #[error("{operation} requires a field object")]
    MissingFields {
        operation: &'static str,
    },

    /// `update` was called without a filter object
    #[error("update requires a filter object")]
    MissingFilter,

    /// A write targeted a field the entity does not declare
    #[error("Entity has no field '{field}'. Only declared fields can be written, use update() to add new ones")]
    UnknownField {
        field: String,
    },

    /// A write targeted the identifier field, which never changes after construction
    #[error("Field '{field}' is the entity's identifier and cannot be written")]
    IdNotWritable {
        field: String,
    },

    /// An entity-scoped request was attempted on an entity the server never identified
    #[error("Cannot {operation} an entity that has no ID")]
    EntityWithoutId {
        operation: &'static str,
    },
}

/// Errors surfaced by client operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Validation failed before any request was emitted
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The server acknowledged the request with an error
    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },

    /// The acknowledgment payload did not have the expected shape
    #[error("Malformed response to {operation}: {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },
}

impl ClientError {
    pub(crate) fn operation_failed(operation: &'static str, error: RemoteError) -> Self {
        Self::OperationFailed {
            operation,
            message: error.message,
        }
    }

    pub(crate) fn malformed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation,
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
