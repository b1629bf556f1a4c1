//! Failure taxonomy shared by the domain services.
//!
//! | Variant       | Meaning                                                        |
//! |---------------|----------------------------------------------------------------|
//! | `Validation`  | Input violates a domain invariant (self-friendship, blank name, unresolved owner or friend reference) |
//! | `NotFound`    | An id does not resolve to a record                             |
//! | `Timeout`     | No reply arrived within the bound; downstream unavailable or overloaded |
//! | `Conflict`    | A write would break the symmetric-friendship or cascade-ordering rule |
//! | `Unavailable` | The broker itself refused the request                          |
//! | `Storage`     | The local store failed                                         |
//!
//! Callers that cannot tell "does not exist" from "could not ask" must treat
//! `NotFound` and `Timeout` the same way: no destructive side effect proceeds.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the cat and owner domain services.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Input violates a domain invariant.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The id does not resolve to an existing record.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// No reply arrived before the deadline.
    #[error("no reply to {operation} within {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The write would violate a cross-record invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The broker could not carry the request.
    #[error("downstream unavailable: {0}")]
    Unavailable(String),

    /// The local record store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns `true` for outcomes where the caller could not learn whether
    /// the referenced record exists (`NotFound`, `Timeout`, `Unavailable`).
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Timeout { .. } | Self::Unavailable(_)
        )
    }
}
