//! Timeout enforcement.
//!
//! Every store and database call is wrapped in a deadline. Expiry surfaces as
//! the caller's own error type (via `From<DeadlineExceeded>`), so a timeout
//! counts as a store fault for the breaker and triggers fail-open upstream.

use std::future::Future;
use std::time::Duration;

/// A deadline elapsed before the wrapped operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded(Duration);

impl DeadlineExceeded {
    pub fn new(limit: Duration) -> Self {
        Self(limit)
    }

    pub fn millis(&self) -> u64 {
        self.0.as_millis() as u64
    }
}

/// Run `fut` with a deadline of `limit`.
pub async fn with_deadline<T, E, F>(limit: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DeadlineExceeded>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(E::from(DeadlineExceeded::new(limit))),
    }
}
