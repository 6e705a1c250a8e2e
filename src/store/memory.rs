//! In-process counting store.
//!
//! Backs tests and single-instance development runs. Per-key atomicity comes
//! from the DashMap entry lock: a `window_hit` holds the shard guard for its
//! key across the whole purge/count/insert/expire sequence, while hits for
//! other keys proceed on their own shards.
//!
//! Expiry is evaluated lazily against the injected [`Clock`], so tests can
//! step past a TTL without sleeping.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::store::types::{StoreError, StoreResult, WindowSnapshot};
use crate::store::CountingStore;

#[derive(Debug, Clone)]
enum Slot {
    Value(String),
    /// Timestamps kept sorted ascending.
    Window(Vec<f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<f64>,
}

impl Entry {
    fn is_expired(&self, now: f64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// A thread-safe in-memory store with fault injection.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    window_faults: AtomicBool,
    operations: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store driven by the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            available: AtomicBool::new(true),
            window_faults: AtomicBool::new(false),
            operations: AtomicU64::new(0),
        }
    }

    /// Simulate the store going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail only `window_hit` calls, leaving plain reads and writes working.
    pub fn set_window_faults(&self, failing: bool) {
        self.window_faults.store(failing, Ordering::SeqCst);
    }

    /// Number of operations attempted against the store, failed ones included.
    pub fn operations(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Live entries in a window set, without recording a hit.
    pub fn window_len(&self, key: &str) -> usize {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.slot {
                Slot::Window(stamps) => stamps.len(),
                Slot::Value(_) => 0,
            },
            _ => 0,
        }
    }

    /// Drop a key regardless of type.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn begin(&self) -> StoreResult<f64> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(self.clock.now())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn expiry(now: f64, ttl: Option<Duration>) -> Option<f64> {
        ttl.map(|ttl| now + ttl.as_secs_f64())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl CountingStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.begin()?;

        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match &entry.slot {
                Slot::Value(v) => Some(v.clone()),
                Slot::Window(_) => {
                    return Err(StoreError::Protocol(format!(
                        "WRONGTYPE key '{}' holds a window set",
                        key
                    )))
                }
            },
            _ => None,
        };

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let now = self.begin()?;
        self.entries.insert(
            key.to_string(),
            Entry {
                slot: Slot::Value(value.to_string()),
                expires_at: Self::expiry(now, ttl),
            },
        );
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Option<Duration>) -> StoreResult<()> {
        // One availability check for the batch: either every key lands or none does.
        let now = self.begin()?;
        let expires_at = Self::expiry(now, ttl);
        for (key, value) in entries {
            self.entries.insert(
                key.clone(),
                Entry {
                    slot: Slot::Value(value.clone()),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn window_hit(&self, key: &str, now: f64, window_secs: u64) -> StoreResult<WindowSnapshot> {
        let store_now = self.begin()?;
        if self.window_faults.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(500));
        }
        let window = window_secs as f64;

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Window(Vec::new()),
            expires_at: None,
        });

        if entry.is_expired(store_now) || !matches!(entry.slot, Slot::Window(_)) {
            entry.slot = Slot::Window(Vec::new());
        }

        let snapshot = match &mut entry.slot {
            Slot::Window(stamps) => {
                let cutoff = now - window;
                stamps.retain(|&ts| ts >= cutoff);

                let snapshot = WindowSnapshot {
                    count: stamps.len() as u64,
                    oldest: stamps.first().copied(),
                };

                let at = stamps.partition_point(|&ts| ts <= now);
                stamps.insert(at, now);
                snapshot
            }
            Slot::Value(_) => WindowSnapshot::empty(),
        };

        entry.expires_at = Some(store_now + window);
        Ok(snapshot)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.begin().map(|_| ())
    }
}
