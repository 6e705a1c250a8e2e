//! Circuit breaker around the shared store.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: store assumed down, calls fail fast without touching it
//! - Half-Open: a single trial call decides whether to close again
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: recovery_timeout elapsed since opened_at
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! Only store faults count as failures. A rate-limit decision, allowed or
//! blocked, is a success. One breaker per process, shared through `Arc`;
//! horizontally scaled instances each keep their own.

use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::schema::BreakerConfig;
use crate::gateway::types::GatewayError;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of the breaker, for admin inspection and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    /// Clock seconds at which the circuit last opened.
    pub opened_at: Option<f64>,
    pub trial_in_flight: bool,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<f64>,
    trial_in_flight: bool,
}

/// Failure-tracking circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        metrics::record_breaker_state(BreakerState::Closed);
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn from_config(config: &BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.recovery_timeout_secs),
            clock,
        )
    }

    /// Run `fut` through the breaker.
    ///
    /// When the circuit is open the future is dropped unpolled and
    /// `GatewayError::BreakerOpen` is returned.
    pub async fn call<T, F>(&self, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let mut permit = self.acquire()?;
        let result = fut.await;

        match &result {
            Ok(_) => permit.succeed(),
            Err(e) if e.is_store_fault() => permit.fail(),
            Err(_) => permit.release(),
        }

        result
    }

    /// Current state as the next call would see it. An Open circuit whose
    /// recovery timeout has elapsed reads as Half-Open; the stored state only
    /// moves when that call arrives.
    pub fn state(&self) -> BreakerState {
        self.effective_state(&self.lock())
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: self.effective_state(&inner),
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at,
            trial_in_flight: inner.trial_in_flight,
        }
    }

    /// Open the circuit now, as if the threshold had just been reached.
    pub fn force_open(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.max(self.failure_threshold);
        self.trip(&mut inner);
    }

    /// Put the circuit into Half-Open with no trial outstanding.
    pub fn force_half_open(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::HalfOpen;
        inner.trial_in_flight = false;
        metrics::record_breaker_state(inner.state);
    }

    /// Close the circuit and clear the failure count.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
        metrics::record_breaker_state(inner.state);
        tracing::info!("Circuit breaker reset");
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves counters, not invariants, half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn recovery_due(&self, inner: &Inner) -> bool {
        let opened_at = inner.opened_at.unwrap_or_else(|| self.clock.now());
        self.clock.now() - opened_at >= self.recovery_timeout.as_secs_f64()
    }

    fn effective_state(&self, inner: &Inner) -> BreakerState {
        match inner.state {
            BreakerState::Open if self.recovery_due(inner) => BreakerState::HalfOpen,
            state => state,
        }
    }

    fn acquire(&self) -> Result<Permit<'_>, GatewayError> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(Permit::new(self, false)),
            BreakerState::Open => {
                if self.recovery_due(&inner) {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    metrics::record_breaker_state(inner.state);
                    tracing::info!(
                        recovery_timeout_secs = self.recovery_timeout.as_secs(),
                        "Circuit breaker half-open, admitting trial call"
                    );
                    Ok(Permit::new(self, true))
                } else {
                    Err(GatewayError::BreakerOpen)
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(GatewayError::BreakerOpen)
                } else {
                    inner.trial_in_flight = true;
                    Ok(Permit::new(self, true))
                }
            }
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(self.clock.now());
        inner.trial_in_flight = false;
        metrics::record_breaker_state(inner.state);
        tracing::warn!(
            consecutive_failures = inner.consecutive_failures,
            recovery_timeout_secs = self.recovery_timeout.as_secs(),
            "Circuit breaker opened"
        );
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        if trial {
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.trial_in_flight = false;
            metrics::record_breaker_state(inner.state);
            tracing::info!("Circuit breaker closed after successful trial");
        } else if inner.state == BreakerState::Closed {
            inner.consecutive_failures = 0;
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        if trial {
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            self.trip(&mut inner);
        } else if inner.state == BreakerState::Closed {
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            if inner.consecutive_failures >= self.failure_threshold {
                self.trip(&mut inner);
            }
        }
    }

    fn on_release(&self, trial: bool) {
        if trial {
            let mut inner = self.lock();
            inner.trial_in_flight = false;
        }
    }
}

/// RAII permission to make one call. A trial permit dropped without an
/// outcome (e.g. the request was cancelled) frees the trial slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn succeed(&mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    fn fail(&mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }

    fn release(&mut self) {
        self.settled = true;
        self.breaker.on_release(self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_release(self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn breaker() -> (Arc<ManualClock>, CircuitBreaker) {
        let clock = Arc::new(ManualClock::new(0.0));
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60), clock.clone());
        (clock, breaker)
    }

    fn fault() -> GatewayError {
        GatewayError::Store(StoreError::Unavailable("down".into()))
    }

    async fn failing(b: &CircuitBreaker, attempts: &AtomicU32) -> Result<(), GatewayError> {
        b.call(async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(fault())
        })
        .await
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let (_clock, b) = breaker();
        let attempts = AtomicU32::new(0);

        for i in 1..=4 {
            assert!(failing(&b, &attempts).await.is_err());
            assert_eq!(b.state(), BreakerState::Closed, "still closed after {} failures", i);
        }
        assert!(failing(&b, &attempts).await.is_err());
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(attempts.load(Ordering::SeqCst), 5);

        // Short-circuits without polling the future.
        let err = failing(&b, &attempts).await.unwrap_err();
        assert!(matches!(err, GatewayError::BreakerOpen));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_count() {
        let (_clock, b) = breaker();
        let attempts = AtomicU32::new(0);

        for _ in 0..4 {
            let _ = failing(&b, &attempts).await;
        }
        b.call(async { Ok::<_, GatewayError>(()) }).await.unwrap();
        assert_eq!(b.snapshot().consecutive_failures, 0);

        for _ in 0..4 {
            let _ = failing(&b, &attempts).await;
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        let (clock, b) = breaker();
        b.force_open();

        clock.advance(Duration::from_secs(59));
        assert!(matches!(
            b.call(async { Ok::<_, GatewayError>(()) }).await,
            Err(GatewayError::BreakerOpen)
        ));

        clock.advance(Duration::from_secs(1));
        b.call(async { Ok::<_, GatewayError>(()) }).await.unwrap();
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens() {
        let (clock, b) = breaker();
        let attempts = AtomicU32::new(0);
        b.force_open();

        clock.advance(Duration::from_secs(60));
        assert!(failing(&b, &attempts).await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::Open);
        assert_eq!(snap.opened_at, Some(60.0));

        // Recovery timer restarted from the failed trial.
        clock.advance(Duration::from_secs(30));
        assert!(matches!(failing(&b, &attempts).await, Err(GatewayError::BreakerOpen)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_only_one_trial_in_half_open() {
        let (_clock, b) = breaker();
        b.force_half_open();

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = b.call(async move {
            let _ = release_rx.await;
            Ok::<_, GatewayError>(())
        });
        let second_call = async {
            tokio::task::yield_now().await;
            let second = b.call(async { Ok::<_, GatewayError>(()) }).await;
            let _ = release_tx.send(());
            second
        };

        let (trial_result, second_result) = tokio::join!(trial, second_call);
        assert!(trial_result.is_ok());
        assert!(matches!(second_result, Err(GatewayError::BreakerOpen)));
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_trial_frees_slot() {
        let (_clock, b) = breaker();
        b.force_half_open();

        {
            let pending = b.call(std::future::pending::<Result<(), GatewayError>>());
            tokio::pin!(pending);
            assert!(futures_poll_once(pending.as_mut()).await.is_none());
        }
        assert!(!b.snapshot().trial_in_flight);

        b.call(async { Ok::<_, GatewayError>(()) }).await.unwrap();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_non_store_errors_do_not_count() {
        let (_clock, b) = breaker();
        for _ in 0..10 {
            let _ = b
                .call(async { Err::<(), _>(GatewayError::Config("bad window".into())) })
                .await;
        }
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.snapshot().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_state_reads_half_open_once_recovery_due() {
        let (clock, b) = breaker();
        b.force_open();

        clock.advance(Duration::from_secs(59));
        assert_eq!(b.state(), BreakerState::Open);

        clock.advance(Duration::from_secs(1));
        assert_eq!(b.state(), BreakerState::HalfOpen);
        let snap = b.snapshot();
        assert_eq!(snap.state, BreakerState::HalfOpen);
        assert!(!snap.trial_in_flight);
        // Reading did not consume the trial.
        assert_eq!(b.state(), BreakerState::HalfOpen);

        b.call(async { Ok::<_, GatewayError>(()) }).await.unwrap();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_reset_closes() {
        let (_clock, b) = breaker();
        b.force_open();
        b.reset();
        assert_eq!(b.snapshot().state, BreakerState::Closed);
        assert!(b.snapshot().opened_at.is_none());
    }

    async fn futures_poll_once<F: Future + Unpin>(fut: F) -> Option<F::Output> {
        let mut fut = fut;
        std::future::poll_fn(|cx| {
            use std::task::Poll;
            match std::pin::Pin::new(&mut fut).poll(cx) {
                Poll::Ready(v) => Poll::Ready(Some(v)),
                Poll::Pending => Poll::Ready(None),
            }
        })
        .await
    }
}
