//! Sync and bulk error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that abort a whole batch.
///
/// Per-order problems never show up here; they are recorded as
/// [`ItemFailure`](crate::ItemFailure)s inside the batch result.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The persistence layer failed; no order in the batch can be trusted
    /// to have been handled.
    #[error("Batch aborted: {0}")]
    Fatal(#[source] DomainError),
}

impl SyncError {
    pub fn domain(&self) -> &DomainError {
        match self {
            SyncError::Fatal(e) => e,
        }
    }
}

/// Convenience type alias for sync results.
pub type Result<T> = std::result::Result<T, SyncError>;
