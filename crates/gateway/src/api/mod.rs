pub mod auth;
pub mod capabilities;
pub mod health;
pub mod telemetry;
pub mod turns;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Only `/healthz` is public. Everything else — including `/readyz` — sits
/// behind the `AO_API_TOKEN` bearer-token middleware, per the contract's
/// literal "all routes other than `/healthz`" wording.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/healthz", get(health::healthz));

    let protected = Router::new()
        .route("/readyz", get(health::readyz))
        .route("/v1/turns", post(turns::run_turn))
        .route("/v1/capabilities", get(capabilities::list_capabilities))
        .route(
            "/v1/capabilities/refresh",
            post(capabilities::refresh_capabilities),
        )
        .route("/v1/telemetry/:scope_key", get(telemetry::get_telemetry))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
