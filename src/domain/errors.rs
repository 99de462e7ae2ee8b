//! Domain errors for the tracesmith ingestion and QA system.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::TraceStatus;
use crate::domain::validation::ValidationErrors;

/// Domain-level errors raised by the public trace and blob operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Trace not found: {0}")]
    TraceNotFound(Uuid),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Invalid blob id format: {0}")]
    InvalidBlobId(String),

    #[error("Trace {trace_id} status is '{actual}', expected '{expected}'")]
    UnexpectedStatus {
        trace_id: Uuid,
        actual: TraceStatus,
        expected: TraceStatus,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TraceStatus, to: TraceStatus },

    #[error("Duplicate event_id(s): {}", .0.join(", "))]
    DuplicateEventIds(Vec<String>),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse classification of a [`DomainError`] for the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Pipeline,
    Internal,
}

impl ErrorKind {
    /// HTTP status code a router should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Pipeline | Self::Internal => 500,
        }
    }
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidBlobId(_) => ErrorKind::Validation,
            Self::TraceNotFound(_) | Self::BlobNotFound(_) => ErrorKind::NotFound,
            Self::UnexpectedStatus { .. }
            | Self::InvalidStateTransition { .. }
            | Self::DuplicateEventIds(_)
            | Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::Pipeline(_) => ErrorKind::Pipeline,
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::StorageError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// JSON body a router would send for this error.
    ///
    /// Validation failures carry the full field error list; every other error
    /// is rendered as a single `detail` string.
    pub fn to_response_body(&self) -> serde_json::Value {
        match self {
            Self::Validation(errors) => errors.to_response_body(),
            other => serde_json::json!({ "detail": other.to_string() }),
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::StorageError(err.to_string())
    }
}
