// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /api/predict-image tests

use axum::http::{header, StatusCode};

use super::support::*;

#[tokio::test]
async fn test_returns_inline_jpeg() {
    let app = TestApp::new(StubDetector::with_damage());
    let png = png_bytes();

    let response = app
        .call(upload_request("/api/predict-image", &[Part::file("image/png", &png)]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "inline; filename=\"annotated.jpg\""
    );

    let body = body_bytes(response).await;
    let decoded = image::load_from_memory(&body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 48));

    // Inline mode writes nothing to the store
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_annotations_are_burned_in() {
    let plain = TestApp::new(StubDetector::new(vec![]));
    let annotated = TestApp::new(StubDetector::with_damage());
    let png = png_bytes();

    let plain_body = body_bytes(
        plain
            .call(upload_request("/api/predict-image", &[Part::file("image/png", &png)]))
            .await,
    )
    .await;
    let annotated_body = body_bytes(
        annotated
            .call(upload_request("/api/predict-image", &[Part::file("image/png", &png)]))
            .await,
    )
    .await;

    assert_ne!(plain_body, annotated_body);
}

#[tokio::test]
async fn test_unsupported_media_type_is_415() {
    let app = TestApp::new(StubDetector::with_damage());
    let png = png_bytes();

    let response = app
        .call(upload_request("/api/predict-image", &[Part::file("image/webp", &png)]))
        .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let app = TestApp::new(StubDetector::with_damage());
    let big = vec![0u8; 8 * 1024 * 1024 + 1];

    let response = app
        .call(upload_request("/api/predict-image", &[Part::file("image/png", &big)]))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_corrupt_image_is_400() {
    let app = TestApp::new(StubDetector::with_damage());

    let response = app
        .call(upload_request(
            "/api/predict-image",
            &[Part::file("image/png", b"\x89PNG\r\n\x1a\nbroken")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inference_failure_is_500() {
    let app = TestApp::new(StubDetector::failing());
    let jpeg = jpeg_bytes();

    let response = app
        .call(upload_request("/api/predict-image", &[Part::file("image/jpeg", &jpeg)]))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
