//! Sliding window rate limiter.
//!
//! Each identity owns an ordered set of hit timestamps in the shared store.
//! A check purges entries older than the window, counts what is left, notes
//! the oldest survivor, and inserts the current hit, all in one atomic store
//! batch. The hit is inserted even when the request is blocked, so a client
//! hammering while limited keeps pushing its own window forward.

use std::sync::Arc;

use crate::clock::Clock;
use crate::gateway::types::GatewayError;
use crate::store::{limiter_key, CountingStore};

/// Admission decision for one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the oldest hit leaves the window; 0 when allowed.
    pub retry_after_secs: u64,
    /// Hits already in the window before this one.
    pub count: u64,
}

/// Per-identity sliding window limiter over a [`CountingStore`].
pub struct SlidingWindowLimiter {
    store: Arc<dyn CountingStore>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn CountingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a hit for `identity` and decide whether it is within `limit` per `window_secs`.
    ///
    /// A `limit` of 0 blocks every request. A zero window is rejected before
    /// the store is touched.
    pub async fn check(&self, identity: &str, limit: u64, window_secs: u64) -> Result<RateDecision, GatewayError> {
        if window_secs == 0 {
            return Err(GatewayError::Config("rate limit window must be at least one second".to_string()));
        }

        let now = self.clock.now();
        let snapshot = self
            .store
            .window_hit(&limiter_key(identity), now, window_secs)
            .await?;

        if snapshot.count >= limit {
            let retry_after_secs = retry_after(now, snapshot.oldest, window_secs);
            tracing::debug!(
                identity = %identity,
                count = snapshot.count,
                limit,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Ok(RateDecision {
                allowed: false,
                retry_after_secs,
                count: snapshot.count,
            });
        }

        Ok(RateDecision {
            allowed: true,
            retry_after_secs: 0,
            count: snapshot.count,
        })
    }
}

/// Seconds until `oldest` ages out of a `window_secs` window, in `[1, window_secs]`.
///
/// With no surviving entry (only possible when the limit is 0) the full window is returned.
pub fn retry_after(now: f64, oldest: Option<f64>, window_secs: u64) -> u64 {
    let Some(oldest) = oldest else {
        return window_secs;
    };

    let remaining = (window_secs as f64 - (now - oldest)).floor();
    // Clock skew between writers can put `oldest` in the future; cap at the window.
    remaining.clamp(1.0, window_secs.max(1) as f64) as u64
}
