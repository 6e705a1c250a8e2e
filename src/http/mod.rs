//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware: request id, trace, timeout, concurrency cap)
//!     → request.rs (X-API-Key extraction)
//!     → gateway pipeline
//!     → response.rs (Outcome → status, headers, JSON)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{API_KEY_HEADER, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
