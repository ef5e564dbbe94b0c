//! Request-side enforcement: principal extraction, the admin gate, and the
//! rate-limit middleware.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use marketgate_core_types::{AdminRole, Principal, RequestId};
use marketgate_privilege_center::PrivilegeDecision;
use marketgate_rate_guard::RateLimitResult;

use crate::errors::MarketGateError;
use crate::identity::Credentials;
use crate::server::state::GateState;

pub(crate) fn credentials_from(headers: &HeaderMap) -> Credentials {
    let bearer_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.to_string());
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string());
    Credentials {
        bearer_token,
        client_ip,
    }
}

/// Resolve identity and privilege for an admin route, in the order the
/// taxonomy requires: 401 for no principal, then the resolution chain, then
/// 403 for unprivileged or under-ranked principals. Store failures propagate.
pub(crate) async fn require_admin(
    state: &GateState,
    headers: &HeaderMap,
    required: AdminRole,
) -> Result<(Principal, PrivilegeDecision), MarketGateError> {
    let credentials = credentials_from(headers);
    let principal = state.identity.resolve(&credentials).await?;
    let Some(principal) = principal else {
        return Err(MarketGateError::Unauthenticated);
    };

    let decision = state.privileges.resolve(Some(&principal)).await?;
    if !decision.is_privileged {
        return Err(MarketGateError::PrivilegeDenied);
    }
    let role = decision.role.ok_or(MarketGateError::PrivilegeDenied)?;
    if !role.has_role(required) {
        warn!(
            principal = %principal.id,
            %role,
            required = %required,
            "admin route denied for under-ranked role"
        );
        return Err(MarketGateError::PrivilegeDenied);
    }

    Ok((principal, decision))
}

/// Fixed-window admission for `/api` routes. Keyed by principal id when the
/// caller authenticates, otherwise by forwarded client address.
pub(crate) async fn rate_limit(
    State(state): State<GateState>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(&state, request.headers()).await;
    match state
        .rate_guard
        .check_and_consume(&identifier, state.rate_limit, state.rate_window_ms)
        .await
    {
        Ok(result) if result.allowed => {
            let mut response = next.run(request).await;
            apply_rate_headers(&mut response, &result);
            response
        }
        Ok(result) => {
            warn!(%identifier, "rate limit exceeded");
            let mut response = MarketGateError::RateLimitExceeded {
                retry_after_secs: result.retry_after_secs.unwrap_or(0),
            }
            .into_response();
            apply_rate_headers(&mut response, &result);
            response
        }
        Err(err) => MarketGateError::from(err).into_response(),
    }
}

async fn client_identifier(state: &GateState, headers: &HeaderMap) -> String {
    let credentials = credentials_from(headers);
    match state.identity.resolve(&credentials).await {
        Ok(Some(principal)) => principal.id,
        Ok(None) => anonymous_identifier(&credentials),
        Err(err) => {
            warn!(%err, "identity resolution failed; rate limiting by client address");
            anonymous_identifier(&credentials)
        }
    }
}

fn anonymous_identifier(credentials: &Credentials) -> String {
    credentials
        .client_ip
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_rate_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", numeric_header(result.limit as u64));
    headers.insert(
        "x-ratelimit-remaining",
        numeric_header(result.remaining as u64),
    );
    headers.insert("x-ratelimit-reset", numeric_header(result.reset_at_ms));
}

fn numeric_header(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// Response tagging: a request id and wall-clock duration on every response.
pub(crate) async fn observability(request: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    let started = Instant::now();
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert("x-request-id", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}ms", started.elapsed().as_millis())) {
        headers.insert("x-response-time", value);
    }
    response
}
