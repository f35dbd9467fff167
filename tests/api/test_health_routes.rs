// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Health, route listing, UI and CORS tests

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use std::sync::atomic::Ordering;

use super::support::*;

#[tokio::test]
async fn test_health_returns_ok() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app.call(get_request("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_health_has_no_side_effects() {
    let app = TestApp::new(StubDetector::with_damage());

    for _ in 0..3 {
        let response = app.call(get_request("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.detector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_routes_lists_registered_paths() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app.call(get_request("/routes")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!(["/static", "/health", "/routes", "/api/predict", "/api/predict-image", "/ui"])
    );
}

#[tokio::test]
async fn test_ui_serves_html() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app.call(get_request("/ui")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"), "{}", content_type);

    let body = body_bytes(response).await;
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/api/predict-image"));
}

#[tokio::test]
async fn test_predict_rejects_get() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app.call(get_request("/api/predict")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app.call(get_request("/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_static_file_is_404() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app
        .call(get_request("/static/00000000000000000000000000000000.jpg"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = TestApp::new(StubDetector::with_damage());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/predict")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.call(request).await;
    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
