//! Pipeline outcomes and the gateway error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::identity::types::{Identity, SourceError, Tier};
use crate::resilience::timeouts::DeadlineExceeded;
use crate::store::StoreError;

/// Errors raised by pipeline stages.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No API key supplied. Terminal: answered as unauthorized.
    #[error("Missing API Key")]
    MissingKey,

    /// Key not present in the source of truth.
    #[error("Invalid API Key")]
    InvalidKey,

    /// Cache, limiter or flag store fault.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Source-of-truth lookup fault.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The circuit breaker short-circuited the call.
    #[error("circuit breaker open")]
    BreakerOpen,

    /// Kill switch is set. Terminal: answered as a hard block.
    #[error("Global Block Active")]
    KillSwitchActive,

    /// The whole pipeline ran past the request deadline.
    #[error("request deadline exceeded after {0} ms")]
    Deadline(u64),

    /// Misconfiguration detected at call time (e.g. a zero-length window).
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<DeadlineExceeded> for GatewayError {
    fn from(elapsed: DeadlineExceeded) -> Self {
        GatewayError::Deadline(elapsed.millis())
    }
}

impl GatewayError {
    /// I/O failure or timeout against a backing store. These are the faults the breaker counts.
    pub fn is_store_fault(&self) -> bool {
        matches!(self, GatewayError::Store(_) | GatewayError::Source(_))
    }

    /// Errors answered directly instead of failing open.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GatewayError::MissingKey | GatewayError::KillSwitchActive)
    }
}

/// Result of one pass through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Under the limit.
    Allowed { identity: Identity },
    /// Over the limit; the client should wait `retry_after_secs`.
    Blocked { identity: Identity, retry_after_secs: u64 },
    /// An internal fault was converted into a grant.
    Degraded { reason: String },
    /// Kill switch active.
    KillSwitched,
    /// No API key.
    Unauthorized,
}

impl Outcome {
    /// Label used in telemetry and metrics.
    pub fn result(&self) -> &'static str {
        match self {
            Outcome::Allowed { .. } => "allowed",
            Outcome::Blocked { .. } => "blocked",
            Outcome::Degraded { .. } => "degraded",
            Outcome::KillSwitched => "kill_switched",
            Outcome::Unauthorized => "unauthorized",
        }
    }

    /// Whether the caller is let through to the origin.
    pub fn grants_access(&self) -> bool {
        matches!(self, Outcome::Allowed { .. } | Outcome::Degraded { .. })
    }
}

/// Everything observable about a handled request.
#[derive(Debug, Clone)]
pub struct RequestReport {
    pub outcome: Outcome,
    /// Resolved user id, or `anonymous` when resolution did not complete.
    pub user_id: String,
    pub tier: Tier,
    pub latency: Duration,
    /// Fault that caused a degraded outcome.
    pub error: Option<String>,
}

impl RequestReport {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}
