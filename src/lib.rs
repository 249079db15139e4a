pub mod config;
pub mod counters;
pub mod debug;
pub mod decode;
pub mod error;
pub mod handlers;
pub mod health;
pub mod lifecycle;
pub mod middleware;
pub mod model;
pub mod proto;
pub mod sink;
pub mod state;
pub mod telemetry;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware as axum_middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::set_header::SetResponseHeaderLayer;

use state::AppState;

/// Builds the full router: data-plane endpoints behind the middleware
/// chain, health and debug endpoints bypassing it.
pub fn app(state: AppState) -> Router {
    let data_routes = Router::new()
        .route("/v1/datapoint", post(handlers::datapoint_v1))
        .route("/v2/datapoint", post(handlers::datapoint_v2))
        .route("/v2/event", post(handlers::event_v2))
        .route("/v1/collectd", post(handlers::collectd))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::data_pipeline,
        ))
        // Stage 2 of the middleware chain: the constant header set.
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static("sfx-proxy"),
        ));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/debug/vars", get(debug::debug_vars))
        .merge(data_routes)
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(State(state): State<AppState>) -> Response {
    state.counters.incr_not_found();
    (StatusCode::NOT_FOUND, "not found").into_response()
}
