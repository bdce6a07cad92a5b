//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a [`DomainError`], used by callers to map
/// failures onto user-visible responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The addressed entity does not exist.
    NotFound,
    /// The supplied value failed validation.
    InvalidInput,
    /// The actor may not perform the attempted action.
    Forbidden,
    /// The action collides with current state.
    Conflict,
    /// Storage failure or inconsistent persisted state.
    Internal,
}

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A request, field, subfield, change request or comment was not found.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// Identifier or token used for the lookup.
        key: String,
    },

    /// A value failed registry or text validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The actor lacks the role or permission for the attempted action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No-op update, duplicate value, or double-open change request.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Optimistic concurrency conflict on a request's version.
    #[error("concurrency conflict on request {request_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The request that had the conflict.
        request_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Every field of the request already has a value.
    #[error("no incomplete fields")]
    NoIncompleteFields,

    /// Every field of the request has already been reviewed.
    #[error("no unreviewed fields")]
    NoUnreviewedFields,

    /// A storage failure or a referential-integrity violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Shorthand for a [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns the coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::NoIncompleteFields | Self::NoUnreviewedFields => {
                ErrorKind::NotFound
            }
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) | Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
