//! Outcome to HTTP response mapping.
//!
//! | Outcome       | Status | Body                                                           |
//! |---------------|--------|----------------------------------------------------------------|
//! | Allowed       | 200    | `{"status":"success","user":..,"tier":..}`                    |
//! | Blocked       | 429    | empty, `Retry-After: <secs>`                                   |
//! | KillSwitched  | 503    | `{"detail":"Global Block Active"}`                            |
//! | Unauthorized  | 401    | `{"detail":"Missing API Key"}`                                |
//! | Degraded      | 200    | `{"status":"degraded","message":"Access granted via fail-open"}` |

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::gateway::types::Outcome;

pub const FAIL_OPEN_MESSAGE: &str = "Access granted via fail-open";

/// Render a pipeline outcome.
pub fn render(outcome: &Outcome) -> Response {
    match outcome {
        Outcome::Allowed { identity } => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "user": identity.user_id,
                "tier": identity.tier,
            })),
        )
            .into_response(),
        Outcome::Blocked {
            retry_after_secs, ..
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_secs.to_string())],
        )
            .into_response(),
        Outcome::KillSwitched => detail(StatusCode::SERVICE_UNAVAILABLE, "Global Block Active"),
        Outcome::Unauthorized => detail(StatusCode::UNAUTHORIZED, "Missing API Key"),
        Outcome::Degraded { .. } => (
            StatusCode::OK,
            Json(json!({
                "status": "degraded",
                "message": FAIL_OPEN_MESSAGE,
            })),
        )
            .into_response(),
    }
}

pub fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}
