//! Core error taxonomy surfaced to callers of note, sharing and analytics
//! operations.

use crate::access::DenyReason;
use crate::model::note::{MalformedNoteId, NoteId, ShareValidationError};
use crate::repo::RepoError;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed identifier; caller error, not retryable.
    #[error("invalid id: `{0}`")]
    InvalidId(String),
    /// Well-formed id with no record behind it.
    #[error("note not found: {0}")]
    NotFound(NoteId),
    #[error("denied: {0}")]
    Denied(DenyReason),
    /// Transient store condition; retry with backoff.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// Non-transient persistence failure.
    #[error("storage failure: {0}")]
    Storage(RepoError),
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Stable machine-readable code for wire surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::Denied(_) => "denied",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ValidationFailed(_) => "validation_failed",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Unavailable(message) => Self::StoreUnavailable(message),
            RepoError::Conflict(id) => {
                Self::StoreUnavailable(format!("note {id} changed concurrently; retry"))
            }
            other => Self::Storage(other),
        }
    }
}

impl From<MalformedNoteId> for CoreError {
    fn from(value: MalformedNoteId) -> Self {
        Self::InvalidId(value.0)
    }
}

impl From<ShareValidationError> for CoreError {
    fn from(value: ShareValidationError) -> Self {
        Self::ValidationFailed(value.to_string())
    }
}
