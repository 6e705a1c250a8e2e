//! Global kill switch.
//!
//! A single flag in the shared store, managed out of band. Because it lives
//! in the same store as the limiter, a store outage also hides the flag; the
//! policy decides what that means.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::schema::KillSwitchConfig;
use crate::store::{CountingStore, StoreResult};

/// Behaviour when the flag cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KillSwitchPolicy {
    /// Treat the read fault like any other: the request fails open and is granted.
    #[default]
    FailOpen,
    /// Treat an unreadable flag as set: the request is hard-blocked.
    FailClosed,
}

pub struct KillSwitch {
    store: Arc<dyn CountingStore>,
    key: String,
    policy: KillSwitchPolicy,
}

impl KillSwitch {
    pub fn new(store: Arc<dyn CountingStore>, config: &KillSwitchConfig) -> Self {
        Self {
            store,
            key: config.key.clone(),
            policy: config.policy,
        }
    }

    pub fn policy(&self) -> KillSwitchPolicy {
        self.policy
    }

    /// Read the flag. An absent key means inactive.
    pub async fn is_active(&self) -> StoreResult<bool> {
        Ok(self
            .store
            .get(&self.key)
            .await?
            .map(|raw| flag_is_set(&raw))
            .unwrap_or(false))
    }

    /// Write the flag (no TTL).
    pub async fn set_active(&self, active: bool) -> StoreResult<()> {
        let value = if active { "true" } else { "false" };
        self.store.set(&self.key, value, None).await?;
        tracing::warn!(key = %self.key, active, "Kill switch updated");
        Ok(())
    }
}

fn flag_is_set(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("true") || raw == "1"
}
