//! Integration tests driving the full HTTP stack: router, handlers,
//! ingestion gate, and the in-memory repository.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use shorecast::config::AppConfig;
use shorecast::db::LocalRepository;
use shorecast::http::{create_router, AppState};
use shorecast::services::rate_limit::InMemoryRateLimiter;

fn test_app(config: AppConfig) -> Router {
    let repo = Arc::new(LocalRepository::new());
    let state = AppState::new(repo, Arc::new(InMemoryRateLimiter::new()), config);
    create_router(state)
}

fn submit_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/reports")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "integration-test/1.0")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_submission(reporter: &str) -> Value {
    json!({
        "locationId": "bondi",
        "crowdLevel": 3,
        "reporterHash": reporter,
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(AppConfig::default());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_submit_report_returns_persisted_row() {
    let app = test_app(AppConfig::default());
    let response = app
        .oneshot(submit_request(json!({
            "locationId": "bondi",
            "crowdLevel": 3,
            "waterCondition": 2,
            "reporterHash": "device-1",
            "attribution": {"source": "qr", "tracking": "dropped"}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["locationId"], "bondi");
    assert_eq!(body["crowdLevel"], 3);
    assert_eq!(body["waterCondition"], 2);
    assert!(body["id"].is_string());
    assert!(body["createdAt"].is_string());
    // Attribution filtered to the allow-list
    assert_eq!(body["attribution"]["source"], "qr");
    assert!(body["attribution"].get("tracking").is_none());
    // Client context never leaves the server
    assert!(body.get("clientOrigin").is_none());
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let cases = [
        (json!({"crowdLevel": 3, "reporterHash": "d"}), "invalid_location_id"),
        (
            json!({"locationId": "bondi", "crowdLevel": 9, "reporterHash": "d"}),
            "invalid_crowd_level",
        ),
        (
            json!({"locationId": "bondi", "crowdLevel": "busy", "reporterHash": "d"}),
            "invalid_crowd_level",
        ),
        (
            json!({"locationId": "bondi", "crowdLevel": 2}),
            "invalid_reporter_hash",
        ),
    ];

    for (body, expected_code) in cases {
        let app = test_app(AppConfig::default());
        let response = app.oneshot(submit_request(body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let error = body_json(response).await;
        assert_eq!(error["code"], expected_code, "body {}", body);
    }
}

#[tokio::test]
async fn test_submit_malformed_body() {
    let app = test_app(AppConfig::default());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/reports")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "invalid_body");
}

#[tokio::test]
async fn test_submit_oversized_body() {
    let app = test_app(AppConfig::default());
    let huge = json!({
        "locationId": "bondi",
        "crowdLevel": 3,
        "reporterHash": "device-1",
        "attribution": {"source": "x".repeat(20_000)}
    });

    let response = app.oneshot(submit_request(huge)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let error = body_json(response).await;
    assert_eq!(error["code"], "payload_too_large");
}

#[tokio::test]
async fn test_duplicate_submission_too_soon() {
    let app = test_app(AppConfig::default());

    let first = app
        .clone()
        .oneshot(submit_request(valid_submission("device-1")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(submit_request(valid_submission("device-1")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().get(header::RETRY_AFTER).is_some());
    let error = body_json(second).await;
    assert_eq!(error["code"], "too_soon");
    assert!(error["retryAfterSeconds"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_volume_limit_over_budget() {
    let mut config = AppConfig::default();
    config.gate.volume_max_per_window = 2;
    let app = test_app(config);

    for i in 0..2 {
        let response = app
            .clone()
            .oneshot(submit_request(valid_submission(&format!("device-{}", i))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(submit_request(valid_submission("device-9")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let error = body_json(response).await;
    assert_eq!(error["code"], "rate_limited");
    assert!(error["retryAfterSeconds"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_feed_returns_recent_reports_newest_first() {
    let app = test_app(AppConfig::default());

    for reporter in ["device-1", "device-2", "device-3"] {
        let response = app
            .clone()
            .oneshot(submit_request(valid_submission(reporter)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/locations/bondi/reports")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cache = response
        .headers()
        .get(header::CACHE_CONTROL)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cache.contains("stale-while-revalidate"));

    let body = body_json(response).await;
    assert_eq!(body["locationId"], "bondi");
    assert_eq!(body["total"], 3);
    let reports = body["reports"].as_array().unwrap();
    let times: Vec<chrono::DateTime<chrono::Utc>> = reports
        .iter()
        .map(|r| r["createdAt"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(
        times.windows(2).all(|w| w[0] >= w[1]),
        "feed must be newest first: {:?}",
        times
    );
}

#[tokio::test]
async fn test_snapshot_endpoint_reflects_consensus() {
    let app = test_app(AppConfig::default());

    let response = app
        .clone()
        .oneshot(submit_request(json!({
            "locationId": "bondi",
            "crowdLevel": 4,
            "reporterHash": "device-1",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/locations/bondi/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["locationId"], "bondi");
    assert_eq!(body["snapshot"]["crowdLevel"], 4);
    assert_eq!(body["snapshot"]["state"], "LIVE");
    assert_eq!(body["snapshot"]["reportsCount"], 1);
    assert!(body["snapshot"]["confidence"].as_f64().unwrap() > 0.15);
}

#[tokio::test]
async fn test_snapshot_for_unreported_location_is_baseline() {
    let app = test_app(AppConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/locations/nowhere/snapshot")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["snapshot"]["state"], "PRED");
    assert_eq!(body["snapshot"]["crowdLevel"], 1);
    assert_eq!(body["snapshot"]["confidence"], 0.15);
    assert_eq!(body["snapshot"]["reportsCount"], 0);
    assert!(body["snapshot"].get("updatedAt").is_none());
}

#[tokio::test]
async fn test_batch_snapshots_cover_all_locations() {
    let app = test_app(AppConfig::default());

    for (location, level) in [("bondi", 4), ("manly", 1)] {
        let response = app
            .clone()
            .oneshot(submit_request(json!({
                "locationId": location,
                "crowdLevel": level,
                "reporterHash": format!("device-{}", location),
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/snapshots")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let snapshots = body["snapshots"].as_object().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots["bondi"]["crowdLevel"], 4);
    assert_eq!(snapshots["manly"]["crowdLevel"], 1);
}

#[tokio::test]
async fn test_prune_requires_token() {
    // No token configured: pruning is disabled entirely
    let app = test_app(AppConfig::default());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/admin/prune?dry_run=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Token configured: wrong credentials still refused
    let mut config = AppConfig::default();
    config.retention.admin_token = Some("sekrit".to_string());
    let app = test_app(config.clone());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/admin/prune?dry_run=true")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Correct token, dry run: nothing to delete on an empty store
    let app = test_app(config);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/admin/prune?dry_run=true")
                .header(header::AUTHORIZATION, "Bearer sekrit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["candidates"], 0);
    assert_eq!(body["deleted"], 0);
    assert_eq!(body["dryRun"], true);
}

#[tokio::test]
async fn test_duration_retry_is_bounded_by_cooldown() {
    let mut config = AppConfig::default();
    config.gate.cooldown = Duration::from_secs(600);
    let app = test_app(config);

    app.clone()
        .oneshot(submit_request(valid_submission("device-1")))
        .await
        .unwrap();
    let response = app
        .oneshot(submit_request(valid_submission("device-1")))
        .await
        .unwrap();

    let error = body_json(response).await;
    let retry = error["retryAfterSeconds"].as_u64().unwrap();
    assert!(retry <= 600);
}
