//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → kill_switch.rs (global hard block)
//!     → [identity resolution]
//!     → qos.rs (tier → limit)
//!     → rate_limit.rs (sliding window check, through the breaker)
//! ```
//!
//! # Design Decisions
//! - Limits are per identity, not per IP
//! - All counting state lives in the shared store so instances agree
//! - Store faults are errors, never decisions; the pipeline decides how to fail

pub mod kill_switch;
pub mod qos;
pub mod rate_limit;

pub use kill_switch::{KillSwitch, KillSwitchPolicy};
pub use qos::TierLimits;
pub use rate_limit::{retry_after, RateDecision, SlidingWindowLimiter};
