#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use tower::util::ServiceExt;

use marketgate::config::GateConfig;
use marketgate::identity::StaticIdentityResolver;
use marketgate::server::{build_router, GateState};
use marketgate::{LegacyAllowlist, Principal, PrivilegeStore, RateGuard};

pub fn test_config(rate_limit: u32, rate_window_ms: u64) -> GateConfig {
    GateConfig {
        rate_limit,
        rate_window_ms,
        ..GateConfig::default()
    }
}

pub fn build_gate(
    config: &GateConfig,
    store: Arc<dyn PrivilegeStore>,
    allowlist: LegacyAllowlist,
    tokens: &[(&str, Principal)],
) -> (Router, GateState) {
    let mut identity = StaticIdentityResolver::new();
    for (token, principal) in tokens {
        identity = identity.with_token(*token, principal.clone());
    }
    let state = GateState::new(
        Arc::new(identity),
        store,
        Arc::new(allowlist),
        Arc::new(RateGuard::memory()),
        config,
    );
    state.mark_live();
    state.mark_ready();
    (build_router(state.clone()), state)
}

pub async fn get(router: &Router, uri: &str, bearer: Option<&str>) -> Response {
    get_with_headers(router, uri, bearer, &[]).await
}

pub async fn get_with_headers(
    router: &Router,
    uri: &str,
    bearer: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
