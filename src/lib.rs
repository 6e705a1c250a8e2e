//! Sentinel access-control gateway.
//!
//! Resolves API keys to identities (cache-aside over a shared store and a
//! relational source of truth), enforces tiered sliding-window rate limits
//! against the shared store behind a circuit breaker, and fails open on any
//! internal fault. A global kill switch can hard-block all traffic.

pub mod clock;
pub mod config;
pub mod gateway;
pub mod identity;
pub mod store;

// Transport
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::schema::GatewayConfig;
pub use gateway::{Gateway, Outcome, RequestReport};
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
