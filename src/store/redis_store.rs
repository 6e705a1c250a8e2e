//! Redis-backed counting store.
//!
//! Uses a `ConnectionManager` so a dropped connection is re-established in the
//! background; callers only ever see a fault for the single operation that hit
//! it. Every command is bounded by the configured store timeout.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::resilience::timeouts::with_deadline;
use crate::store::types::{StoreError, StoreResult, WindowSnapshot};
use crate::store::CountingStore;

/// Map a client error onto the store taxonomy. A socket timeout reports the
/// configured store timeout, same as an expired deadline.
fn classify(e: RedisError, timeout: Duration) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(timeout.as_millis() as u64)
    } else if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Protocol(e.to_string())
    }
}

/// Decode the `EXEC` reply of the window batch: the count after the purge,
/// then the oldest surviving member with its score.
fn decode_window_reply(reply: &Value) -> StoreResult<WindowSnapshot> {
    let (count, oldest): (u64, Vec<(String, f64)>) = redis::from_redis_value(reply)
        .map_err(|e| StoreError::Protocol(format!("unexpected window reply: {}", e)))?;

    Ok(WindowSnapshot {
        count,
        oldest: oldest.first().map(|(_, score)| *score),
    })
}

/// Counting store on top of Redis (or any RESP-compatible server).
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str, timeout: Duration) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            tracing::warn!(error = %e, "Invalid store URL");
            StoreError::Protocol(format!("invalid store URL: {}", e))
        })?;

        let manager = with_deadline(timeout, async {
            ConnectionManager::new(client)
                .await
                .map_err(|e| classify(e, timeout))
        })
        .await?;

        let store = Self { manager, timeout };
        store.ping().await?;

        tracing::info!("Connected to shared counting store");
        Ok(store)
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl CountingStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn();
        with_deadline(self.timeout, async {
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<String>>(&mut conn)
                .await
                .map_err(|e| classify(e, self.timeout))
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        with_deadline(self.timeout, async {
            cmd.query_async::<()>(&mut conn)
                .await
                .map_err(|e| classify(e, self.timeout))
        })
        .await
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Option<Duration>) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            let cmd = pipe.cmd("SET").arg(key).arg(value);
            if let Some(ttl) = ttl {
                cmd.arg("EX").arg(ttl.as_secs().max(1));
            }
            cmd.ignore();
        }

        with_deadline(self.timeout, async {
            pipe.query_async::<()>(&mut conn)
                .await
                .map_err(|e| classify(e, self.timeout))
        })
        .await
    }

    async fn window_hit(&self, key: &str, now: f64, window_secs: u64) -> StoreResult<WindowSnapshot> {
        let mut conn = self.conn();
        let cutoff = now - window_secs as f64;
        // Two hits can share a float timestamp; the suffix keeps both members.
        let member = format!("{:.6}-{}", now, Uuid::new_v4().simple());

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("ZREMRANGEBYSCORE").arg(key).arg("-inf").arg(format!("({}", cutoff)).ignore()
            .cmd("ZCARD").arg(key)
            .cmd("ZRANGE").arg(key).arg(0).arg(0).arg("WITHSCORES")
            .cmd("ZADD").arg(key).arg(now).arg(&member).ignore()
            .cmd("EXPIRE").arg(key).arg(window_secs).ignore();

        let reply: Value = with_deadline(self.timeout, async {
            pipe.query_async::<Value>(&mut conn)
                .await
                .map_err(|e| classify(e, self.timeout))
        })
        .await?;

        decode_window_reply(&reply)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let reply: String = with_deadline(self.timeout, async {
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|e| classify(e, self.timeout))
        })
        .await?;

        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(StoreError::Protocol(format!("unexpected PING reply: {}", reply)))
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout_ms", &self.timeout.as_millis())
            .finish()
    }
}
