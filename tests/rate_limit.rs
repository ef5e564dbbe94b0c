mod common;

use std::sync::Arc;

use axum::http::StatusCode;

use marketgate::{InMemoryPrivilegeStore, LegacyAllowlist, Principal};

use common::{body_json, build_gate, get, get_with_headers, test_config};

#[tokio::test]
async fn burst_exhausts_the_window_budget() {
    let config = test_config(3, 60_000);
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let (router, _) = build_gate(&config, store, LegacyAllowlist::empty(), &[]);

    for expected_remaining in ["2", "1", "0"] {
        let response =
            get_with_headers(&router, "/api/ping", None, &[("x-forwarded-for", "10.0.0.9")])
                .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-ratelimit-limit").unwrap(),
            "3"
        );
        assert_eq!(
            response.headers().get("x-ratelimit-remaining").unwrap(),
            expected_remaining
        );
    }

    let response =
        get_with_headers(&router, "/api/ping", None, &[("x-forwarded-for", "10.0.0.9")]).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn identifiers_get_independent_budgets() {
    let config = test_config(1, 60_000);
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let tokens = [(
        "user-token",
        Principal::authenticated("u2", "user@example.com"),
    )];
    let (router, _) = build_gate(&config, store, LegacyAllowlist::empty(), &tokens);

    // The authenticated caller burns its single slot.
    let response = get(&router, "/api/ping", Some("user-token")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = get(&router, "/api/ping", Some("user-token")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // An anonymous caller from a distinct address is unaffected.
    let response =
        get_with_headers(&router, "/api/ping", None, &[("x-forwarded-for", "10.0.0.7")]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_sit_behind_the_same_limiter() {
    let config = test_config(1, 60_000);
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let (router, _) = build_gate(&config, store, LegacyAllowlist::empty(), &[]);

    let headers = [("x-forwarded-for", "10.0.0.8")];
    let response = get_with_headers(&router, "/api/admin/me", None, &headers).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The rejected request still consumed the slot.
    let response = get_with_headers(&router, "/api/admin/me", None, &headers).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn health_surface_is_not_rate_limited() {
    let config = test_config(1, 60_000);
    let store = Arc::new(InMemoryPrivilegeStore::new());
    let (router, _) = build_gate(&config, store, LegacyAllowlist::empty(), &[]);

    let headers = [("x-forwarded-for", "10.0.0.6")];
    let response = get_with_headers(&router, "/api/ping", None, &headers).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = get_with_headers(&router, "/api/ping", None, &headers).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..3 {
        let response = get_with_headers(&router, "/health", None, &headers).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
