//! Operator API.
//!
//! Served on its own listener, behind a bearer token. Lets an operator inspect
//! and reset the circuit breaker and flip the kill switch.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breaker", get(get_breaker))
        .route("/admin/breaker/reset", post(reset_breaker))
        .route("/admin/kill-switch", get(get_kill_switch).put(put_kill_switch))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::GatewayConfig;
    use crate::gateway::Gateway;
    use crate::identity::source::StaticIdentitySource;
    use crate::observability::telemetry::MemorySink;
    use crate::resilience::circuit_breaker::BreakerState;
    use crate::store::{CountingStore, MemoryStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "admin-secret";

    fn state() -> (Arc<MemoryStore>, AppState) {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = KEY.to_string();

        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let source = Arc::new(StaticIdentitySource::new());
        let gateway = Gateway::new(&config, store.clone(), source.clone(), clock, Arc::new(MemorySink::new()));

        let state = AppState {
            gateway: Arc::new(gateway),
            store: store.clone(),
            source,
            config: Arc::new(config),
        };
        (store, state)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let (_store, state) = state();
        let router = setup_admin_router(state);

        let response = router.clone().oneshot(request("GET", "/admin/status", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .clone()
            .oneshot(request("GET", "/admin/status", Some("wrong"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router.oneshot(request("GET", "/admin/status", Some(KEY), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["breaker"], "closed");
        assert_eq!(body["kill_switch_active"], false);
    }

    #[tokio::test]
    async fn test_breaker_inspect_and_reset() {
        let (_store, state) = state();
        state.gateway.breaker().force_open();
        let router = setup_admin_router(state.clone());

        let response = router
            .clone()
            .oneshot(request("GET", "/admin/breaker", Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(json(response).await["state"], "open");

        let response = router
            .oneshot(request("POST", "/admin/breaker/reset", Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(json(response).await["state"], "closed");
        assert_eq!(state.gateway.breaker().state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_kill_switch_toggle_writes_flag() {
        let (store, state) = state();
        let router = setup_admin_router(state);

        let response = router
            .clone()
            .oneshot(request("PUT", "/admin/kill-switch", Some(KEY), Some(r#"{"active":true}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.get("kill_switch").await.unwrap().as_deref(), Some("true"));

        let response = router
            .oneshot(request("GET", "/admin/kill-switch", Some(KEY), None))
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["active"], true);
        assert_eq!(body["policy"], "fail_open");
    }

    #[tokio::test]
    async fn test_kill_switch_store_down_is_503() {
        let (store, state) = state();
        store.set_available(false);
        let response = setup_admin_router(state)
            .oneshot(request("GET", "/admin/kill-switch", Some(KEY), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
