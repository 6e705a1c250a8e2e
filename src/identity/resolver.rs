//! Cache-aside identity resolution.
//!
//! ```text
//! auth:<api_key> hit  → tier:<user_id> (absent → free)
//! auth:<api_key> miss → source of truth → write auth + tier in one batch
//! ```
//!
//! Entries are never invalidated here; a tier change is observed once the
//! cached entries expire. The two entries are written atomically, but they can
//! still be evicted independently, which is why a missing tier degrades to
//! free instead of failing.

use std::sync::Arc;
use std::time::Duration;

use crate::gateway::types::GatewayError;
use crate::identity::source::IdentitySource;
use crate::identity::types::{Identity, Tier};
use crate::observability::metrics;
use crate::store::{auth_key, tier_key, CountingStore};

pub struct IdentityResolver {
    store: Arc<dyn CountingStore>,
    source: Arc<dyn IdentitySource>,
    cache_ttl: Duration,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn CountingStore>, source: Arc<dyn IdentitySource>, cache_ttl: Duration) -> Self {
        Self {
            store,
            source,
            cache_ttl,
        }
    }

    /// Turn an API key into `(user_id, tier)`.
    pub async fn resolve(&self, api_key: Option<&str>) -> Result<Identity, GatewayError> {
        let api_key = match api_key {
            Some(key) if !key.is_empty() => key,
            _ => return Err(GatewayError::MissingKey),
        };

        if let Some(user_id) = self.store.get(&auth_key(api_key)).await? {
            if !user_id.is_empty() {
                metrics::record_identity_cache("hit");
                return self.cached_identity(user_id).await;
            }
        }

        metrics::record_identity_cache("miss");
        let record = self
            .source
            .find_by_api_key(api_key)
            .await?
            .ok_or(GatewayError::InvalidKey)?;

        let entries = [
            (auth_key(api_key), record.user_id.clone()),
            (tier_key(&record.user_id), record.tier.to_string()),
        ];
        self.store.set_many(&entries, Some(self.cache_ttl)).await?;

        tracing::debug!(user_id = %record.user_id, tier = %record.tier, "Identity cache populated");
        Ok(Identity::new(record.user_id, record.tier))
    }

    async fn cached_identity(&self, user_id: String) -> Result<Identity, GatewayError> {
        let tier = match self.store.get(&tier_key(&user_id)).await? {
            Some(raw) => Tier::parse_lenient(&raw),
            None => {
                tracing::debug!(user_id = %user_id, "Tier entry missing, defaulting to free");
                Tier::Free
            }
        };
        Ok(Identity::new(user_id, tier))
    }
}
