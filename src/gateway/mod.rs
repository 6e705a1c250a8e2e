//! Admission gateway.
//!
//! # Data Flow
//! ```text
//! X-API-Key
//!     → pipeline.rs (kill switch, identity, tier limit, breaker-wrapped limiter)
//!     → types.rs Outcome
//!     → RequestReport → telemetry sink + metrics
//! ```

pub mod pipeline;
pub mod types;

pub use pipeline::{Gateway, ANONYMOUS};
pub use types::{GatewayError, Outcome, RequestReport};
