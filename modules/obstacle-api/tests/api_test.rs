//! Router-level tests against in-memory stores.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use obstacle_api::{router, AppState};
use obstacle_common::Identity;
use obstacle_intake::{IdentityResolver, ReportIngestor};
use obstacle_review::{ApprovalWorkflow, DuplicateDetector};
use obstacle_store::{MemoryIdentityStore, MemoryReportStore};

fn app() -> Router {
    let reports = Arc::new(MemoryReportStore::new());
    let identities = Arc::new(MemoryIdentityStore::with_identities([
        Identity {
            id: 1,
            email: "admin@example.no".into(),
            display_name: None,
        },
        Identity {
            id: 5,
            email: "crew@example.no".into(),
            display_name: None,
        },
    ]));
    router(Arc::new(AppState {
        ingestor: ReportIngestor::new(reports.clone(), IdentityResolver::new(identities, Some(1))),
        workflow: ApprovalWorkflow::new(reports, DuplicateDetector::default()),
    }))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with(app, Request::builder().method(method).uri(uri), body).await
}

async fn send_with(
    app: &Router,
    builder: axum::http::request::Builder,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn submit(app: &Router, lat: f64, lon: f64, obstacle_type: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/reports",
        Some(json!({"obstacleType": obstacle_type, "latitude": lat, "longitude": lon})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn submit_uses_reporter_header() {
    let app = app();
    let (status, body) = send_with(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/reports")
            .header("x-reporter-id", "5"),
        Some(json!({"obstacleType": "Crane", "latitude": "58.1", "longitude": "8.0"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["reporterId"], 5);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["statusLabel"], "Pending review");
    assert_eq!(body["geometryType"], "Point");
    assert_eq!(body["hasPhoto"], false);
    assert!(body.get("photo").is_none());
}

#[tokio::test]
async fn missing_obstacle_type_is_bad_request() {
    let app = app();
    let (status, body) = send(&app, "POST", "/api/reports", Some(json!({"latitude": 58.0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("obstacleType"));
}

#[tokio::test]
async fn approve_merge_and_list() {
    let app = app();
    let a = submit(&app, 58.1599, 8.0182, "Tower").await;
    let b = submit(&app, 58.1605, 8.0189, "Tower").await;

    let (status, body) = send(&app, "GET", &format!("/api/reports/{b}/duplicates"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duplicates"][0]["id"], a.as_str());

    let (status, body) = send(&app, "POST", &format!("/api/reports/{b}/approve"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "needs_decision");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/reports/{b}/merge"),
        Some(json!({"duplicateIds": [a]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["target"]["status"], "APPROVED");
    assert_eq!(body["merged"][0]["mergedInto"], b.as_str());

    let (_, listing) = send(&app, "GET", "/api/reports", None).await;
    let listed = listing["reports"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], b.as_str());
    assert_eq!(listed[0]["duplicateCount"], 0);

    let (_, listing) = send(&app, "GET", "/api/reports?include_merged=true&sort=oldest", None).await;
    assert_eq!(listing["reports"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_transition_is_conflict() {
    let app = app();
    let a = submit(&app, 58.1599, 8.0182, "Mast").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/reports/{a}/reject"),
        Some(json!({"reason": "Outside the reporting area"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/reports/{a}/approve"),
        Some(json!({"bypassDuplicates": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("REJECTED"));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/reports/{a}/comments"),
        Some(json!({"authorId": 1, "body": "Confirmed outside area"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_report_is_not_found() {
    let app = app();
    let (status, _) = send(
        &app,
        "GET",
        "/api/reports/7d1b3c2e-0000-4000-8000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_status_filter_is_bad_request() {
    let app = app();
    let (status, _) = send(&app, "GET", "/api/reports?status=ARCHIVED", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrongly_typed_submission_fields_are_validation_errors() {
    let app = app();
    for raw in [
        json!({"obstacleType": 42, "latitude": 58.0, "longitude": 8.0}),
        json!({"obstacleType": "Tower", "latitude": true, "longitude": 8.0}),
        json!({"obstacleType": "Tower", "reporterId": [1]}),
    ] {
        let (status, body) = send(&app, "POST", "/api/reports", Some(raw.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
        assert!(body["error"].is_string(), "{raw} gave {body}");
    }

    let (_, listing) = send(&app, "GET", "/api/reports?include_merged=true", None).await;
    assert!(listing["reports"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_review_bodies_are_validation_errors() {
    let app = app();
    let a = submit(&app, 58.1599, 8.0182, "Tower").await;

    for (path, raw) in [
        ("approve", json!({"bypassDuplicates": "yes"})),
        ("merge", json!({"duplicateIds": "not-a-list"})),
        ("reject", json!({"reason": 7})),
        ("comments", json!({"authorId": "someone", "body": "Seen from the road"})),
    ] {
        let (status, body) = send(&app, "POST", &format!("/api/reports/{a}/{path}"), Some(raw)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
        assert!(body["error"].is_string(), "{path} gave {body}");
    }

    let (_, detail) = send(&app, "GET", &format!("/api/reports/{a}"), None).await;
    assert_eq!(detail["status"], "PENDING");
}

#[tokio::test]
async fn unparseable_json_is_validation_error() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/reports")
        .header("content-type", "application/json")
        .body(Body::from("{\"obstacleType\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}
