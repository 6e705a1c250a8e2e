//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sentinel_gateway::clock::ManualClock;
use sentinel_gateway::config::GatewayConfig;
use sentinel_gateway::gateway::Gateway;
use sentinel_gateway::http::{AppState, HttpServer};
use sentinel_gateway::identity::source::StaticIdentitySource;
use sentinel_gateway::identity::types::Tier;
use sentinel_gateway::lifecycle::Shutdown;
use sentinel_gateway::observability::MemorySink;
use sentinel_gateway::store::MemoryStore;

pub const PRO_KEY: &str = "pro-key";
pub const PRO_USER: &str = "u1";
pub const FREE_KEY: &str = "free-key";
pub const FREE_USER: &str = "u2";

/// A gateway over in-memory backends with a hand-driven clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub source: Arc<StaticIdentitySource>,
    pub sink: Arc<MemorySink>,
    pub config: GatewayConfig,
    pub gateway: Arc<Gateway>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let source = Arc::new(StaticIdentitySource::new());
        source.insert(PRO_KEY, PRO_USER, Tier::Pro);
        source.insert(FREE_KEY, FREE_USER, Tier::Free);
        let sink = Arc::new(MemorySink::new());

        let gateway = Arc::new(Gateway::new(
            &config,
            store.clone(),
            source.clone(),
            clock.clone(),
            sink.clone(),
        ));

        Self {
            clock,
            store,
            source,
            sink,
            config,
            gateway,
        }
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub fn state(&self) -> AppState {
        AppState {
            gateway: self.gateway.clone(),
            store: self.store.clone(),
            source: self.source.clone(),
            config: Arc::new(self.config.clone()),
        }
    }

    /// Serve the public router on an ephemeral local port.
    pub async fn serve(&self) -> (SocketAddr, Shutdown) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();

        let server = HttpServer::new(self.state());
        let stop = shutdown.wait();
        tokio::spawn(async move {
            let _ = server.run(listener, stop).await;
        });

        (addr, shutdown)
    }
}

/// A client that never reuses pooled connections across server restarts.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
