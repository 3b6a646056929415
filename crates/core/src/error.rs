//! Error taxonomy for forest mutations.

use crate::id::IssueId;

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors an operation over the issue forest can report.
///
/// Every variant is local to one operation: the in-memory view only reflects
/// confirmed storage state, so the worst case is a rejected operation, never
/// a corrupted resident index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Rejected before any engine ran; nothing was computed or written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The stored data breaks a structural invariant (for example a sibling
    /// chain with no head, or a cycle). Surfaced, never auto-repaired.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// The operation is not legal in the current state; nothing was written.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// No issue with this id in the current snapshot.
    #[error("no such issue: {0}")]
    NotFound(IssueId),

    /// The atomic commit failed; the in-memory view is unchanged and the
    /// operation can be retried.
    #[error("persistence error: {0}")]
    Persistence(String),
}
