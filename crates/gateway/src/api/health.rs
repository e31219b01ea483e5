//! Liveness/readiness probes. Public, never behind the bearer-token gate.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use std::sync::atomic::Ordering;

use crate::state::AppState;

/// `GET /healthz` — the process is up and serving. Never fails once bound.
pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /readyz` — `false` until the capability index has completed its
/// first `build`, matching the contract's readiness definition.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.ready.load(Ordering::Acquire);
    let status = if ready {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "ready": ready })))
}
