use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::detail;
use crate::http::server::AppState;
use crate::resilience::circuit_breaker::{BreakerSnapshot, BreakerState};
use crate::security::kill_switch::KillSwitchPolicy;
use crate::store::StoreError;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub breaker: BreakerState,
    /// `None` when the flag could not be read.
    pub kill_switch_active: Option<bool>,
    pub window_secs: u64,
    pub free_limit: u64,
    pub pro_limit: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KillSwitchStatus {
    pub active: bool,
    pub policy: KillSwitchPolicy,
}

#[derive(Debug, Deserialize)]
pub struct KillSwitchUpdate {
    pub active: bool,
}

fn store_unavailable(e: StoreError) -> Response {
    tracing::error!(error = %e, "Admin store operation failed");
    detail(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let limits = &state.config.limits;
    let kill_switch_active = state.gateway.kill_switch().is_active().await.ok();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        breaker: state.gateway.breaker().state(),
        kill_switch_active,
        window_secs: limits.window_secs,
        free_limit: limits.free_limit,
        pro_limit: limits.pro_limit,
    })
}

pub async fn get_breaker(State(state): State<AppState>) -> Json<BreakerSnapshot> {
    Json(state.gateway.breaker().snapshot())
}

pub async fn reset_breaker(State(state): State<AppState>) -> Json<BreakerSnapshot> {
    let breaker = state.gateway.breaker();
    breaker.reset();
    Json(breaker.snapshot())
}

pub async fn get_kill_switch(State(state): State<AppState>) -> Response {
    let kill_switch = state.gateway.kill_switch();
    match kill_switch.is_active().await {
        Ok(active) => Json(KillSwitchStatus {
            active,
            policy: kill_switch.policy(),
        })
        .into_response(),
        Err(e) => store_unavailable(e),
    }
}

pub async fn put_kill_switch(
    State(state): State<AppState>,
    Json(update): Json<KillSwitchUpdate>,
) -> Response {
    let kill_switch = state.gateway.kill_switch();
    match kill_switch.set_active(update.active).await {
        Ok(()) => Json(KillSwitchStatus {
            active: update.active,
            policy: kill_switch.policy(),
        })
        .into_response(),
        Err(e) => store_unavailable(e),
    }
}
