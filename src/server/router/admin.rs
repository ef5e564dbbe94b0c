use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;
use tracing::error;

use marketgate_core_types::AdminRole;

use crate::errors::MarketGateError;
use crate::server::guard::require_admin;
use crate::server::state::GateState;

pub(crate) fn router() -> Router<GateState> {
    Router::new()
        .route("/api/admin/me", get(me_handler))
        .route("/api/admin/users", get(list_admins_handler))
}

/// Decision echo for the calling principal. Any admin rank may ask.
async fn me_handler(State(state): State<GateState>, headers: HeaderMap) -> Response {
    match require_admin(&state, &headers, AdminRole::Support).await {
        Ok((principal, decision)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "principal": principal.id,
                "decision": decision,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Privilege record listing, Admin rank and above.
async fn list_admins_handler(State(state): State<GateState>, headers: HeaderMap) -> Response {
    if let Err(err) = require_admin(&state, &headers, AdminRole::Admin).await {
        return err.into_response();
    }

    match state.privilege_store.list_privileges().await {
        Ok(records) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "admins": records,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(%err, "failed to list privilege records");
            MarketGateError::StoreFailure(err.to_string()).into_response()
        }
    }
}
