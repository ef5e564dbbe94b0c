//! Unified error taxonomy at the request-handling edge, with the HTTP
//! mapping the routers rely on.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use marketgate_privilege_center::PrivilegeError;
use marketgate_rate_guard::RateError;

use crate::identity::IdentityError;

#[derive(Debug, Error)]
pub enum MarketGateError {
    /// No valid principal on a privileged endpoint. A decision state, not a
    /// failure.
    #[error("authentication required")]
    Unauthenticated,
    /// Principal resolved but not privileged (or under-ranked).
    #[error("access denied")]
    PrivilegeDenied,
    #[error("too many requests")]
    RateLimitExceeded { retry_after_secs: u64 },
    /// Privilege or counter store unreachable, erroring, or timed out.
    /// Never downgraded to "not privileged" or "not limited".
    #[error("upstream store failure: {0}")]
    StoreFailure(String),
    /// The store answered, but with data that violates an invariant.
    #[error("privilege data error: {0}")]
    DataError(String),
    #[error("identity verification failed: {0}")]
    Identity(String),
}

impl MarketGateError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            MarketGateError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MarketGateError::PrivilegeDenied => StatusCode::FORBIDDEN,
            MarketGateError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            MarketGateError::StoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            MarketGateError::DataError(_) | MarketGateError::Identity(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<PrivilegeError> for MarketGateError {
    fn from(value: PrivilegeError) -> Self {
        if value.is_store_failure() {
            MarketGateError::StoreFailure(value.to_string())
        } else {
            MarketGateError::DataError(value.to_string())
        }
    }
}

impl From<RateError> for MarketGateError {
    fn from(value: RateError) -> Self {
        MarketGateError::StoreFailure(value.to_string())
    }
}

impl From<IdentityError> for MarketGateError {
    fn from(value: IdentityError) -> Self {
        MarketGateError::Identity(value.to_string())
    }
}

impl IntoResponse for MarketGateError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let retry_after = match &self {
            MarketGateError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let mut response = (
            status,
            Json(json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
