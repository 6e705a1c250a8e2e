//! Ordered startup: backing stores, then the pipeline, then application state.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::SystemClock;
use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::http::server::AppState;
use crate::identity::source::PgIdentitySource;
use crate::identity::types::SourceError;
use crate::observability::telemetry::TracingSink;
use crate::store::{RedisStore, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("shared store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("source of truth misconfigured: {0}")]
    Source(#[from] SourceError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Connect the backing stores and assemble the shared application state.
///
/// The shared store must answer at startup. The database pool connects
/// lazily, so a database outage only degrades lookups.
pub async fn build_state(config: GatewayConfig) -> Result<AppState, StartupError> {
    let store = Arc::new(
        RedisStore::connect(&config.store.url, Duration::from_millis(config.store.timeout_ms)).await?,
    );
    let source = Arc::new(PgIdentitySource::connect_lazy(&config.database)?);

    let gateway = Gateway::new(
        &config,
        store.clone(),
        source.clone(),
        Arc::new(SystemClock),
        Arc::new(TracingSink),
    );

    tracing::info!(
        free_limit = config.limits.free_limit,
        pro_limit = config.limits.pro_limit,
        window_secs = config.limits.window_secs,
        breaker_threshold = config.breaker.failure_threshold,
        "Gateway pipeline ready"
    );

    Ok(AppState {
        gateway: Arc::new(gateway),
        store,
        source,
        config: Arc::new(config),
    })
}

/// Bind a TCP listener, naming the address on failure.
pub async fn bind(address: &str) -> Result<tokio::net::TcpListener, StartupError> {
    tokio::net::TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
