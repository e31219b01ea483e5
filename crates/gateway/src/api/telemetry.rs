//! `GET /v1/telemetry/:scopeKey` — current KPI window for a scope.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};

use ao_domain::outcome::ScopeKey;

use crate::state::AppState;

/// Parse the `scopeKey` path segment back into a [`ScopeKey`], matching
/// `ScopeKey::as_string()`'s format.
fn parse_scope_key(raw: &str) -> Option<ScopeKey> {
    if raw == "global" {
        return Some(ScopeKey::Global);
    }
    if let Some(user_id) = raw.strip_prefix("user:") {
        return Some(ScopeKey::User { user_id: user_id.to_string() });
    }
    if let Some(rest) = raw.strip_prefix("org:") {
        if let Some((organization_id, user_part)) = rest.split_once(":user:") {
            return Some(ScopeKey::Composite {
                user_id: user_part.to_string(),
                organization_id: organization_id.to_string(),
            });
        }
        return Some(ScopeKey::Organization { organization_id: rest.to_string() });
    }
    None
}

pub async fn get_telemetry(
    State(state): State<AppState>,
    Path(scope_key): Path<String>,
) -> impl IntoResponse {
    let Some(scope) = parse_scope_key(&scope_key) else {
        return (
            axum::http::StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("unrecognized scope key \"{scope_key}\"") })),
        )
            .into_response();
    };

    let window = state.telemetry.snapshot(&scope);
    Json(serde_json::json!({
        "scope_key": window.scope_key,
        "sample_count": window.sample_count,
        "success_count": window.success_count,
        "partial_count": window.partial_count,
        "failed_count": window.failed_count,
        "success_rate": window.success_rate,
        "weighted_success_rate": window.weighted_success_rate,
        "last_alert_at_ms": window.last_alert_at_ms,
    }))
    .into_response()
}
