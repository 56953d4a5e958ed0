//! End-to-end tests for the request pipeline against a mock server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentauri_client::client::{ApiClient, RequestOptions};
use agentauri_client::config::ClientConfig;
use agentauri_client::error::ClientError;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(ClientConfig::new(server.uri())).expect("build client")
}

fn csrf_mock(token: &str) -> Mock {
    Mock::given(method("GET"))
        .and(path("/api/v1/csrf-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
}

#[tokio::test]
async fn post_attaches_csrf_token_and_parses_json() {
    let server = MockServer::start().await;
    csrf_mock("tok-1").expect(1).mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/triggers"))
        .and(header("x-csrf-token", "tok-1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "name": "x" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1",
            "name": "x"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let created: Option<Value> = client
        .post("/triggers", Some(&json!({ "name": "x" })), RequestOptions::new())
        .await
        .expect("post");

    assert_eq!(created, Some(json!({ "id": "t1", "name": "x" })));
}

#[tokio::test]
async fn csrf_token_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    csrf_mock("tok-1").expect(1).mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/triggers"))
        .and(header("x-csrf-token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    for _ in 0..2 {
        let _: Option<Value> = client
            .post("/triggers", Some(&json!({})), RequestOptions::new())
            .await
            .expect("post");
    }
}

#[tokio::test]
async fn get_builds_query_and_drops_none_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/events"))
        .and(query_param("page", "2"))
        .and(query_param("active", "true"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let events: Option<Value> = client
        .get(
            "/events",
            RequestOptions::new()
                .with_param("page", 2i64)
                .with_param("active", true)
                .with_optional_param::<i64>("cursor", None),
        )
        .await
        .expect("get");

    assert_eq!(events, Some(json!([])));
}

#[tokio::test]
async fn success_without_json_content_type_resolves_to_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/agents/42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result: Option<Value> = client
        .get("/agents/42", RequestOptions::new())
        .await
        .expect("204 should not be an error");

    assert_eq!(result, None);
}

#[tokio::test]
async fn slow_responses_time_out_with_status_zero() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result: Result<Option<Value>, _> = client
        .get(
            "/events",
            RequestOptions::new().with_timeout(Duration::from_millis(100)),
        )
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(100)));
    assert_eq!(err.status(), 0);
}

#[tokio::test]
async fn unauthorized_triggers_refresh_and_one_retry() {
    let server = MockServer::start().await;

    // First hit is 401; the post-refresh re-issue succeeds.
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "org-1" }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let orgs: Option<Value> = client
        .get("/organizations", RequestOptions::new())
        .await
        .expect("refresh then retry");

    assert_eq!(orgs, Some(json!([{ "id": "org-1" }])));
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/organizations"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(5)
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(5)
        .mount(&server)
        .await;
    // The delay keeps the refresh in flight while all five 401s arrive.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let requests = (0..5).map(|_| client.get::<Value>("/organizations", RequestOptions::new()));
    let results = futures::future::join_all(requests).await;

    for result in results {
        assert_eq!(result.expect("retried request"), Some(json!([])));
    }
}

#[tokio::test]
async fn forbidden_responses_invalidate_the_csrf_cache() {
    let server = MockServer::start().await;

    csrf_mock("tok-stale").up_to_n_times(1).expect(1).mount(&server).await;
    csrf_mock("tok-fresh").expect(1).mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/triggers"))
        .and(header("x-csrf-token", "tok-stale"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/triggers"))
        .and(header("x-csrf-token", "tok-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    let first: Result<Option<Value>, _> = client
        .post("/triggers", Some(&json!({})), RequestOptions::new())
        .await;
    assert!(first.unwrap_err().is_forbidden());

    let second: Option<Value> = client
        .post("/triggers", Some(&json!({})), RequestOptions::new())
        .await
        .expect("retry with fresh token");
    assert_eq!(second, Some(json!({ "ok": true })));
}

#[tokio::test]
async fn failed_refresh_fires_the_expiry_hook_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/organizations"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({
                "code": "TOKEN_EXPIRED",
                "error": "refresh token expired"
            })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_in_hook = fired.clone();
    client.on_session_expired(move || {
        fired_in_hook.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..2 {
        let result: Result<Option<Value>, _> =
            client.get("/organizations", RequestOptions::new()).await;
        assert!(result.unwrap_err().is_unauthorized());
    }

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_endpoints_never_trigger_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result: Result<Option<Value>, _> = client.get("/auth/me", RequestOptions::new()).await;

    assert!(result.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn error_bodies_surface_message_and_structured_data() {
    let server = MockServer::start().await;
    csrf_mock("tok-1").mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/triggers"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Not enough credits",
            "code": "INSUFFICIENT_CREDITS",
            "details": { "required": 10 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result: Result<Option<Value>, _> = client
        .post("/triggers", Some(&json!({})), RequestOptions::new())
        .await;

    match result.unwrap_err() {
        ClientError::Api {
            status,
            message,
            body,
        } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Not enough credits");
            let body = body.expect("structured body");
            assert_eq!(body.code.as_deref(), Some("INSUFFICIENT_CREDITS"));
            assert_eq!(body.details, Some(json!({ "required": 10 })));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_bodies_get_a_generic_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/events"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result: Result<Option<Value>, _> = client.get("/events", RequestOptions::new()).await;

    match result.unwrap_err() {
        ClientError::Api { status, message, body } => {
            assert_eq!(status, 502);
            assert_eq!(message, "Request failed with status 502");
            assert_eq!(body, None);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn logout_posts_and_clears_the_csrf_cache() {
    let server = MockServer::start().await;
    csrf_mock("tok-1").expect(2).mount(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/triggers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let _: Option<Value> = client
        .post("/triggers", Some(&json!({})), RequestOptions::new())
        .await
        .expect("post");

    client.logout().await.expect("logout");

    // The next mutating request refetches the token.
    let _: Option<Value> = client
        .post("/triggers", Some(&json!({})), RequestOptions::new())
        .await
        .expect("post after logout");
}
