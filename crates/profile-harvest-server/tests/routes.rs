//! In-process route tests for the HTTP front end.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use profile_harvest::config::PoolConfig;
use profile_harvest::{HarvestConfig, Harvester};
use profile_harvest_server::HarvestServer;

// ─────────────────────── helpers ───────────────────────

fn config_for(server: &MockServer) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.pool = PoolConfig {
        max_user_records: 100,
        seeds: Vec::new(),
    };
    config.extraction.page_url_template = format!("{}/{{}}/", server.uri());
    config.extraction.api_url_template = format!("{}/api/{{}}", server.uri());
    config.extraction.throttle_min_secs = 0.0;
    config.extraction.throttle_max_secs = 0.0;
    config.extraction.request_timeout_secs = 5;
    config.refresh.enabled = false;
    config
}

fn app(server: &MockServer, token: Option<&str>) -> axum::Router {
    let harvester = Arc::new(Harvester::new(config_for(server)).unwrap());
    HarvestServer::new(harvester, token.map(str::to_string)).router()
}

fn scrape_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/scrape")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mount_profile(server: &MockServer, target: &str, caller: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{target}")))
        .and(header("x-forwarded-for", caller))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"user": {"username": target, "edge_followed_by": {"count": 5}}}
        })))
        .mount(server)
        .await;
}

// ─────────────────────── routes ───────────────────────

#[tokio::test]
async fn health_is_open_even_with_token() {
    let server = MockServer::start().await;
    let response = app(&server, Some("secret"))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn token_guards_other_routes() {
    let server = MockServer::start().await;
    let app = app(&server, Some("secret"));

    let denied = app
        .clone()
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = app
        .oneshot(
            Request::get("/stats")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    let stats = json_body(allowed).await;
    assert_eq!(stats["total_entries"], 0);
    assert_eq!(stats["success_rate_percent"], 0.0);
}

#[tokio::test]
async fn scrape_uses_forwarded_caller() {
    let server = MockServer::start().await;
    mount_profile(&server, "alice", "203.0.113.50").await;

    let request = Request::builder()
        .method("POST")
        .uri("/scrape")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.50, 10.0.0.2")
        .body(Body::from(json!({"target": "alice"}).to_string()))
        .unwrap();
    let response = app(&server, None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["identity"]["username"], "alice");
    assert_eq!(body["statistics"]["followers"], 5);
    assert_eq!(body["used_identity"], "203.0.113.50");
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn scrape_with_explicit_caller_and_stats() {
    let server = MockServer::start().await;
    mount_profile(&server, "bob", "198.51.100.7").await;
    let app = app(&server, None);

    let response = app
        .clone()
        .oneshot(scrape_request(json!({
            "target": "bob",
            "caller_address": "198.51.100.7",
            "user_agent": "route-test/1"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats = app
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let stats = json_body(stats).await;
    assert_eq!(stats["caller_sourced_count"], 1);
    assert_eq!(stats["user_record_count"], 1);
}

#[tokio::test]
async fn exhausted_scrape_is_bad_gateway() {
    let server = MockServer::start().await;
    let response = app(&server, None)
        .oneshot(scrape_request(json!({
            "target": "ghost",
            "caller_address": "198.51.100.8"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "ScrapingFailed");
    assert_eq!(body["used_identity"], "198.51.100.8");
}

#[tokio::test]
async fn no_identity_is_service_unavailable() {
    let server = MockServer::start().await;
    let response = app(&server, None)
        .oneshot(scrape_request(json!({"target": "alice"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"], "NoIdentityAvailable");
    assert_eq!(body["used_identity"], "direct");
}

#[tokio::test]
async fn blank_target_is_rejected() {
    let server = MockServer::start().await;
    let response = app(&server, None)
        .oneshot(scrape_request(json!({"target": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn probe_reports_offline_target() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    config.extraction.page_url_template = "http://127.0.0.1:9/{}/".to_string();
    let harvester = Arc::new(Harvester::new(config).unwrap());
    let app = HarvestServer::new(harvester, None).router();

    let response = app
        .oneshot(
            Request::get("/probe?caller=203.0.113.3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "OFFLINE");
    assert_eq!(body["used_identity"], "203.0.113.3");
}
