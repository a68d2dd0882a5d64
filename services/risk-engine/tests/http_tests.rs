//! HTTP-level tests for the API surface

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;
use std::sync::Arc;

use riskmesh_config::{ApiKeyEntry, AuthConfig, EngineConfig};
use riskmesh_engine::analytics::RiskAnalytics;
use riskmesh_engine::api::{auth::ApiKeyRegistry, create_router, AppState};
use riskmesh_engine::cache::{MemoryRiskCache, RiskCache};
use riskmesh_engine::metrics::Metrics;
use riskmesh_engine::risk::RiskEngine;
use riskmesh_engine::storage::{MemoryTransactionLog, TransactionLog};

const DEMO_KEY: &str = "riskmesh-key-demo-001";

fn test_server_with_auth(auth: AuthConfig) -> TestServer {
    let log: Arc<dyn TransactionLog> = Arc::new(MemoryTransactionLog::new());
    let cache: Arc<dyn RiskCache> = Arc::new(MemoryRiskCache::default());
    let engine = Arc::new(RiskEngine::new(
        EngineConfig::default(),
        Some(cache.clone()),
        log.clone(),
    ));

    let state = AppState {
        engine,
        analytics: Arc::new(RiskAnalytics::new(log)),
        cache: Some(cache),
        metrics: Arc::new(Metrics::new().unwrap()),
        auth: Arc::new(ApiKeyRegistry::from_config(&auth)),
    };

    TestServer::new(create_router(state)).unwrap()
}

fn test_server() -> TestServer {
    test_server_with_auth(AuthConfig::default())
}

fn sample_event() -> serde_json::Value {
    json!({
        "user_id": "u1",
        "device_id": "d1",
        "ip_address": "10.0.0.1",
        "merchant_id": "m1",
        "transaction_amount": 50.0
    })
}

#[tokio::test]
async fn test_health_is_open() {
    let server = test_server();
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["service"], "riskmesh");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_api_requires_key() {
    let server = test_server();
    let response = server.get("/api/stats").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_rejects_unknown_key() {
    let server = test_server();
    let response = server
        .get("/api/stats")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("not-a-key"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn test_event_scoring_round_trip() {
    let server = test_server();
    let response = server
        .post("/api/event")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .json(&sample_event())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    let risk = body["risk_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&risk));
    assert!(body["transaction_id"].is_string());
    assert!(body["explanation"]["recommendation"].is_string());
    assert_eq!(body["cached"], false);

    // The event landed in the graph.
    let stats = server
        .get("/api/stats")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    let stats_body: serde_json::Value = stats.json();
    assert_eq!(stats_body["graph_nodes"], 4);
    assert_eq!(stats_body["graph_edges"], 4);
}

#[tokio::test]
async fn test_event_with_missing_field_rejected() {
    let server = test_server();
    let response = server
        .post("/api/event")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .json(&json!({ "user_id": "u1" }))
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_event_with_non_finite_amount_rejected() {
    let server = test_server();
    // JSON can't carry NaN, so an empty field exercises the same 422 path
    // and the engine-side finiteness check is covered by unit tests.
    let mut event = sample_event();
    event["transaction_amount"] = json!("not-a-number");
    let response = server
        .post("/api/event")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .json(&event)
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_rate_limit_sheds_with_429() {
    let server = test_server_with_auth(AuthConfig {
        api_keys: vec![ApiKeyEntry {
            key: "riskmesh-key-tight".to_string(),
            name: "tight".to_string(),
            rate_limit_per_minute: 1,
        }],
    });

    let first = server
        .get("/api/stats")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("riskmesh-key-tight"))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = server
        .get("/api/stats")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static("riskmesh-key-tight"))
        .await;
    assert_eq!(second.status_code(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_analytics_endpoints_round_trip() {
    let server = test_server();

    // Seed a couple of scored transactions.
    for amount in [50.0, 2000.0] {
        let mut event = sample_event();
        event["transaction_amount"] = json!(amount);
        let response = server
            .post("/api/event")
            .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
            .json(&event)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let distribution = server
        .get("/api/analytics/risk-distribution")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(distribution.status_code(), StatusCode::OK);
    let body: serde_json::Value = distribution.json();
    assert_eq!(body["total_transactions"], 2);

    let behavior = server
        .get("/api/analytics/user/u1")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(behavior.status_code(), StatusCode::OK);
    let body: serde_json::Value = behavior.json();
    assert_eq!(body["total_transactions"], 2);
    assert_eq!(body["unique_devices"], 1);

    let top = server
        .get("/api/analytics/top-risky?limit=5")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(top.status_code(), StatusCode::OK);
    let body: serde_json::Value = top.json();
    assert_eq!(body.as_array().unwrap().len(), 1);

    let performance = server
        .get("/api/analytics/performance?hours=24")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(performance.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_analytics_range_validation() {
    let server = test_server();

    let response = server
        .get("/api/analytics/risk-distribution?hours=2000")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = server
        .get("/api/analytics/top-risky?limit=0")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cache_stats_endpoint() {
    let server = test_server();
    let response = server
        .get("/api/cache/stats")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["enabled"], true);
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_metrics_exposition() {
    let server = test_server();

    let event = server
        .post("/api/event")
        .add_header(HeaderName::from_static("x-api-key"), HeaderValue::from_static(DEMO_KEY))
        .json(&sample_event())
        .await;
    assert_eq!(event.status_code(), StatusCode::OK);

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let text = response.text();
    assert!(text.contains("riskmesh_requests_total 1"));
    assert!(text.contains("riskmesh_graph_nodes 4"));
    assert!(text.contains("riskmesh_request_latency_ms_bucket"));
}
