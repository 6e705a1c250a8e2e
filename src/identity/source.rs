//! Source-of-truth lookups for API keys.
//!
//! The relational store owns `users(api_key PRIMARY KEY, user_id, tier DEFAULT 'free')`.
//! The gateway only ever reads it, and only on a cache miss.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::schema::DatabaseConfig;
use crate::identity::types::{IdentityRecord, SourceError, Tier};
use crate::resilience::timeouts::with_deadline;

/// Read access to the API key table.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Look up a key. `Ok(None)` means the key does not exist.
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<IdentityRecord>, SourceError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), SourceError>;
}

/// Postgres implementation.
pub struct PgIdentitySource {
    pool: PgPool,
    timeout: Duration,
}

impl PgIdentitySource {
    /// Build a lazily-connecting pool. The gateway starts even when the
    /// database is down; lookups fault until it comes back.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, SourceError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect_lazy(&config.url)?;

        Ok(Self { pool, timeout })
    }
}

#[async_trait]
impl IdentitySource for PgIdentitySource {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<IdentityRecord>, SourceError> {
        let row: Option<(String, Option<String>)> = with_deadline(self.timeout, async {
            sqlx::query_as::<_, (String, Option<String>)>("SELECT user_id, tier FROM users WHERE api_key = $1 LIMIT 1")
                .bind(api_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Database error finding API key");
                    SourceError::from(e)
                })
        })
        .await?;

        Ok(row.map(|(user_id, tier)| IdentityRecord {
            api_key: api_key.to_string(),
            user_id,
            tier: tier.as_deref().map(Tier::parse_lenient).unwrap_or_default(),
        }))
    }

    async fn ping(&self) -> Result<(), SourceError> {
        with_deadline(self.timeout, async {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(SourceError::from)
        })
        .await
    }
}

/// In-memory key table for tests and local development.
#[derive(Debug, Default)]
pub struct StaticIdentitySource {
    records: DashMap<String, IdentityRecord>,
    lookups: AtomicU64,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl StaticIdentitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a key.
    pub fn insert(&self, api_key: &str, user_id: &str, tier: Tier) {
        self.records.insert(
            api_key.to_string(),
            IdentityRecord {
                api_key: api_key.to_string(),
                user_id: user_id.to_string(),
                tier,
            },
        );
    }

    pub fn remove(&self, api_key: &str) {
        self.records.remove(api_key);
    }

    /// Lookups attempted so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Simulate the database going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every lookup by `latency`, like a slow database.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SourceError::Database("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentitySource for StaticIdentitySource {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<IdentityRecord>, SourceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.check_available()?;
        Ok(self.records.get(api_key).map(|r| r.value().clone()))
    }

    async fn ping(&self) -> Result<(), SourceError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_lookup() {
        let source = StaticIdentitySource::new();
        source.insert("key-pro", "u1", Tier::Pro);

        let record = source.find_by_api_key("key-pro").await.unwrap().unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.tier, Tier::Pro);

        assert!(source.find_by_api_key("nope").await.unwrap().is_none());
        assert_eq!(source.lookups(), 2);
    }

    #[tokio::test]
    async fn test_static_source_outage() {
        let source = StaticIdentitySource::new();
        source.set_available(false);
        assert!(source.find_by_api_key("k").await.is_err());
        assert!(source.ping().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_source_latency() {
        let source = StaticIdentitySource::new();
        source.insert("k", "u1", Tier::Free);
        source.set_latency(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        assert!(source.find_by_api_key("k").await.unwrap().is_some());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_pg_source_builds_without_database() {
        let config = DatabaseConfig {
            url: "postgres://nobody@127.0.0.1:1/none".to_string(),
            max_connections: 1,
            timeout_ms: 100,
        };
        let source = PgIdentitySource::connect_lazy(&config).unwrap();
        assert!(source.ping().await.is_err());
    }
}
