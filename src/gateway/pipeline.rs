//! Request pipeline.
//!
//! ```text
//! kill switch → resolve identity → tier → limit → breaker(sliding window)
//! ```
//!
//! Every stage returns a `Result`. [`Gateway::handle`] is the single place
//! where errors are turned into outcomes: a missing key is answered as
//! unauthorized, an active kill switch as a hard block, and anything else
//! (store down, breaker open, source down, unknown key) fails open.
//!
//! The whole pass runs under the request deadline; running past it is one
//! more fault and fails open like the rest.
//!
//! The kill switch flag lives in the same store as the limiter. Under the
//! default [`KillSwitchPolicy::FailOpen`], a store outage therefore also
//! disables the kill switch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::schema::GatewayConfig;
use crate::gateway::types::{GatewayError, Outcome, RequestReport};
use crate::identity::resolver::IdentityResolver;
use crate::identity::source::IdentitySource;
use crate::identity::types::{Identity, Tier};
use crate::observability::metrics;
use crate::observability::telemetry::TelemetrySink;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::with_deadline;
use crate::security::kill_switch::{KillSwitch, KillSwitchPolicy};
use crate::security::qos::TierLimits;
use crate::security::rate_limit::SlidingWindowLimiter;
use crate::store::CountingStore;

/// User id reported before identity resolution completes.
pub const ANONYMOUS: &str = "anonymous";

/// How far a request got before it finished, for reporting.
struct Progress {
    user_id: String,
    tier: Tier,
}

impl Progress {
    fn new() -> Self {
        Self {
            user_id: ANONYMOUS.to_string(),
            tier: Tier::Free,
        }
    }

    fn resolved(&mut self, identity: &Identity) {
        self.user_id = identity.user_id.clone();
        self.tier = identity.tier;
    }
}

/// The admission pipeline. Cheap to share behind an `Arc`.
pub struct Gateway {
    kill_switch: KillSwitch,
    resolver: IdentityResolver,
    limiter: SlidingWindowLimiter,
    limits: TierLimits,
    breaker: Arc<CircuitBreaker>,
    telemetry: Arc<dyn TelemetrySink>,
    request_deadline: Duration,
}

impl Gateway {
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn CountingStore>,
        source: Arc<dyn IdentitySource>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::from_config(&config.breaker, clock.clone()));

        Self {
            kill_switch: KillSwitch::new(store.clone(), &config.kill_switch),
            resolver: IdentityResolver::new(
                store.clone(),
                source,
                Duration::from_secs(config.identity.cache_ttl_secs),
            ),
            limiter: SlidingWindowLimiter::new(store, clock),
            limits: TierLimits::from(&config.limits),
            breaker,
            telemetry,
            request_deadline: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    /// Replace the breaker, e.g. to share one instance with the admin API or a test.
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn limits(&self) -> TierLimits {
        self.limits
    }

    /// Run one request through the pipeline and report it.
    pub async fn handle(&self, api_key: Option<&str>) -> RequestReport {
        let start = Instant::now();
        let mut progress = Progress::new();

        let result = with_deadline(self.request_deadline, self.evaluate(api_key, &mut progress)).await;

        let (outcome, error) = match result {
            Ok(outcome) => (outcome, None),
            Err(GatewayError::MissingKey) => (Outcome::Unauthorized, None),
            Err(GatewayError::KillSwitchActive) => (Outcome::KillSwitched, None),
            Err(e) => {
                let reason = e.to_string();
                (
                    Outcome::Degraded {
                        reason: reason.clone(),
                    },
                    Some(reason),
                )
            }
        };

        metrics::record_request(outcome.result(), start);

        let report = RequestReport {
            outcome,
            user_id: progress.user_id,
            tier: progress.tier,
            latency: start.elapsed(),
            error,
        };
        self.telemetry.record(&report);
        report
    }

    async fn evaluate(&self, api_key: Option<&str>, progress: &mut Progress) -> Result<Outcome, GatewayError> {
        self.check_kill_switch().await?;

        let identity = self.resolver.resolve(api_key).await?;
        progress.resolved(&identity);

        let limit = self.limits.limit_for(identity.tier);
        let window_secs = self.limits.window_secs();

        let decision = self
            .breaker
            .call(self.limiter.check(&identity.user_id, limit, window_secs))
            .await?;

        if decision.allowed {
            Ok(Outcome::Allowed { identity })
        } else {
            Ok(Outcome::Blocked {
                identity,
                retry_after_secs: decision.retry_after_secs,
            })
        }
    }

    async fn check_kill_switch(&self) -> Result<(), GatewayError> {
        match self.kill_switch.is_active().await {
            Ok(true) => Err(GatewayError::KillSwitchActive),
            Ok(false) => Ok(()),
            Err(e) => match self.kill_switch.policy() {
                KillSwitchPolicy::FailOpen => Err(e.into()),
                KillSwitchPolicy::FailClosed => {
                    tracing::warn!(error = %e, "Kill switch unreadable, blocking");
                    Err(GatewayError::KillSwitchActive)
                }
            },
        }
    }
}
