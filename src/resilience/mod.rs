//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Rate check against the shared store:
//!     → circuit_breaker.rs (short-circuit while open, count store faults)
//!     → timeouts.rs (deadline on every store/database call)
//!     → fault surfaces as GatewayError → pipeline fail-open branch
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: one failed attempt is one breaker failure
//! - Breaker is process-scoped and injected, never a hidden global

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use timeouts::{with_deadline, DeadlineExceeded};
