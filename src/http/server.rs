//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the `/shield` and `/health` handlers
//! - Wire up middleware (request id, tracing, concurrency cap)
//!
//! The request deadline is enforced inside [`Gateway::handle`], so a slow
//! request still fails open and is reported.
//! - Bind server to listener and drain on shutdown

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::health;
use crate::http::request::{extract_api_key, request_id};
use crate::http::response::render;
use crate::identity::source::IdentitySource;
use crate::store::CountingStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub store: Arc<dyn CountingStore>,
    pub source: Arc<dyn IdentitySource>,
    pub config: Arc<GatewayConfig>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let max_in_flight = state.config.listener.max_connections.max(1);

        Router::new()
            .route("/shield", get(shield_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(GlobalConcurrencyLimitLayer::new(max_in_flight))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for in-process serving (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Admission check for the caller's API key.
async fn shield_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let api_key = extract_api_key(&headers);
    let report = state.gateway.handle(api_key.as_deref()).await;

    tracing::debug!(
        request_id = %request_id(&headers),
        result = report.outcome.result(),
        "Shield request handled"
    );

    render(&report.outcome)
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let report = health::probe(
        state.store.as_ref(),
        state.source.as_ref(),
        state.gateway.breaker().state(),
    )
    .await;

    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::identity::source::StaticIdentitySource;
    use crate::identity::types::Tier;
    use crate::observability::telemetry::MemorySink;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn server() -> (Arc<MemoryStore>, Arc<StaticIdentitySource>, HttpServer) {
        let (store, source, _sink, server) = server_with(GatewayConfig::default());
        (store, source, server)
    }

    fn server_with(
        config: GatewayConfig,
    ) -> (Arc<MemoryStore>, Arc<StaticIdentitySource>, Arc<MemorySink>, HttpServer) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let source = Arc::new(StaticIdentitySource::new());
        source.insert("free-key", "u2", Tier::Free);

        let sink = Arc::new(MemorySink::new());
        let gateway = Gateway::new(&config, store.clone(), source.clone(), clock, sink.clone());
        let state = AppState {
            gateway: Arc::new(gateway),
            store: store.clone(),
            source: source.clone(),
            config: Arc::new(config),
        };
        (store, source, sink, HttpServer::new(state))
    }

    fn shield(key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/shield");
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_shield_success_has_request_id() {
        let (_store, _source, server) = server();
        let response = server.router().oneshot(shield(Some("free-key"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_shield_rate_limits_free_tier() {
        let (_store, _source, server) = server();
        let router = server.router();

        for _ in 0..5 {
            let response = router.clone().oneshot(shield(Some("free-key"))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = router.oneshot(shield(Some("free-key"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        // Manual clock did not move: the oldest hit has the full window left.
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }

    #[tokio::test]
    async fn test_shield_without_key_is_401() {
        let (_store, _source, server) = server();
        let response = server.router().oneshot(shield(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_shield_fails_open_when_store_down() {
        let (store, _source, server) = server();
        store.set_available(false);
        let response = server.router().oneshot(shield(Some("free-key"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_past_deadline_fails_open() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 1;
        config.database.timeout_ms = 5_000;
        let (_store, source, sink, server) = server_with(config);
        source.set_latency(std::time::Duration::from_secs(2));

        let response = server.router().oneshot(shield(Some("free-key"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "degraded");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result, "degraded");
    }

    #[tokio::test]
    async fn test_health_reflects_dependencies() {
        let (store, _source, server) = server();
        let request = || Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = server.router().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        store.set_available(false);
        let response = server.router().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
