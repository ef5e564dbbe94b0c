use axum::{
    extract::State, http::Method, middleware, response::IntoResponse, routing::get, Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

mod admin;

pub(crate) use admin::router as admin_routes;

use super::guard;
use super::state::GateState;

/// Full gate router: health surface plus the rate-limited `/api` tree.
pub fn build_router(state: GateState) -> Router {
    let api = Router::new()
        .route("/api/ping", get(ping_handler))
        .merge(admin_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::rate_limit,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/livez", get(live_handler))
        .route("/readyz", get(ready_handler))
        .merge(api)
        .layer(middleware::from_fn(guard::observability))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn ping_handler() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "pong",
    }))
}

async fn health_handler(State(state): State<GateState>) -> Json<Value> {
    let snapshot = state.health_snapshot();
    Json(json!({
        "status": "ok",
        "ready": snapshot.ready,
        "live": snapshot.live,
        "last_ready_check_ts": snapshot.last_ready_check,
        "last_error": snapshot.last_error,
    }))
}

async fn live_handler(State(state): State<GateState>) -> impl IntoResponse {
    let snapshot = state.health_snapshot();
    let status = if snapshot.live {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "live": snapshot.live,
            "ready": snapshot.ready,
        })),
    )
}

async fn ready_handler(State(state): State<GateState>) -> impl IntoResponse {
    let snapshot = state.health_snapshot();
    let status = if snapshot.ready {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "ready": snapshot.ready,
            "live": snapshot.live,
            "last_ready_check_ts": snapshot.last_ready_check,
            "last_error": snapshot.last_error,
        })),
    )
}
