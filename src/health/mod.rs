//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → probe.rs (ping shared store and source of truth concurrently)
//!     → HealthReport (Healthy only if every dependency answers)
//! ```
//!
//! # Design Decisions
//! - Probes run on demand; no background task
//! - A degraded dependency does not stop `/shield` from answering (it fails open)

pub mod probe;

pub use probe::{probe, DependencyStatus, HealthReport, HealthStatus};
