//! Store result types and error definitions.

use thiserror::Error;

use crate::resilience::timeouts::DeadlineExceeded;

/// Errors raised by the shared counting store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Connection refused, dropped, or the store is otherwise unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete within its deadline.
    #[error("store timeout after {0} ms")]
    Timeout(u64),

    /// The store answered with something we could not interpret.
    #[error("store protocol error: {0}")]
    Protocol(String),
}

impl From<DeadlineExceeded> for StoreError {
    fn from(elapsed: DeadlineExceeded) -> Self {
        StoreError::Timeout(elapsed.millis())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// What a sliding-window batch observed before inserting the new hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSnapshot {
    /// Entries that survived the age purge, not counting the new one.
    pub count: u64,
    /// Timestamp of the oldest surviving entry.
    pub oldest: Option<f64>,
}

impl WindowSnapshot {
    pub fn empty() -> Self {
        Self {
            count: 0,
            oldest: None,
        }
    }
}
