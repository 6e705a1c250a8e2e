//! Shared counting store subsystem.
//!
//! # Data Flow
//! ```text
//! identity resolver ──get/set_many──▶ ┐
//! sliding window    ──window_hit────▶ ├─ CountingStore ─▶ RedisStore  (production)
//! kill switch       ──get/set───────▶ ┘                 ─▶ MemoryStore (tests, local dev)
//! ```
//!
//! # Key Namespace
//! - `auth:<api_key>` → user id (TTL 3600s)
//! - `tier:<user_id>` → tier name (TTL 3600s)
//! - `limiter:<user_id>` → ordered timestamp set (TTL = window)
//! - `kill_switch` → flag, no TTL, managed out of band
//!
//! # Design Decisions
//! - Cross-request coordination relies only on the store's per-key atomicity
//! - Entries expire through store-side TTL; nothing in-process sweeps them

pub mod memory;
pub mod redis_store;
pub mod types;

use async_trait::async_trait;
use std::time::Duration;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use types::{StoreError, StoreResult, WindowSnapshot};

/// Abstraction over the external key-value / ordered-set store.
#[async_trait]
pub trait CountingStore: Send + Sync {
    /// Read a string value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// Write several string values as one atomic batch.
    async fn set_many(&self, entries: &[(String, String)], ttl: Option<Duration>) -> StoreResult<()>;

    /// Record a hit at `now` in the window set under `key`.
    ///
    /// Purges entries older than `now - window_secs`, reads the surviving
    /// count and oldest timestamp, inserts `now` and refreshes the key's TTL
    /// to `window_secs`, all as one indivisible unit for that key.
    async fn window_hit(&self, key: &str, now: f64, window_secs: u64) -> StoreResult<WindowSnapshot>;

    /// Liveness probe.
    async fn ping(&self) -> StoreResult<()>;
}

/// Cache key mapping an API key to its user id.
pub fn auth_key(api_key: &str) -> String {
    format!("auth:{}", api_key)
}

/// Cache key mapping a user id to its tier.
pub fn tier_key(user_id: &str) -> String {
    format!("tier:{}", user_id)
}

/// Window set key for a user id.
pub fn limiter_key(user_id: &str) -> String {
    format!("limiter:{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespace() {
        assert_eq!(auth_key("k-123"), "auth:k-123");
        assert_eq!(tier_key("u1"), "tier:u1");
        assert_eq!(limiter_key("u1"), "limiter:u1");
    }
}
