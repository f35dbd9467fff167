// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handlers

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};

use super::request::{read_image_upload, PredictParams};
use super::response::{PredictResponse, INLINE_DISPOSITION};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{decode_image, encode_jpeg, normalize, run_inference, Detector, Prediction};

/// POST /api/predict - Detect damage and link the annotated image
///
/// # Request
/// - multipart field `file`: JPEG or PNG image (required)
/// - query `conf`: confidence threshold (default 0.25)
///
/// # Response
/// - `detections`: `{bbox_xyxy, class_id, class_name, confidence, polygon?}` list
/// - `annotated_url`: `/static/<token>.jpg`
///
/// # Errors
/// - 415 Unsupported Media Type: not JPEG/PNG
/// - 413 Payload Too Large: upload over the limit
/// - 400 Bad Request: missing field, bad `conf`, undecodable image
/// - 500 Internal Server Error: inference or storage failed
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PredictParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let (prediction, jpeg) = annotate_upload(&state, params, multipart).await?;
    let detections = normalize(&prediction);

    let stored = state.store.persist(&jpeg).await.map_err(|e| {
        warn!("Failed to store annotated image: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "Predict: {} detections, annotated image at {}",
        detections.len(),
        stored.url
    );

    Ok(Json(PredictResponse {
        detections,
        annotated_url: stored.url,
    }))
}

/// POST /api/predict-image - Detect damage and return the annotated JPEG
///
/// Same inputs and error mapping as `/api/predict`. The body is the JPEG
/// itself with `Content-Disposition: inline; filename="annotated.jpg"`.
pub async fn predict_image_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<PredictParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let (prediction, jpeg) = annotate_upload(&state, params, multipart).await?;

    debug!(
        "Predict-image: {} detections, {} byte JPEG",
        prediction.len(),
        jpeg.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CONTENT_DISPOSITION, INLINE_DISPOSITION),
        ],
        jpeg,
    )
        .into_response())
}

/// Shared pipeline: validate, read, decode, infer, render and encode
async fn annotate_upload(
    state: &AppState,
    params: Result<Query<PredictParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(Prediction, Vec<u8>), ApiError> {
    let Query(params) = params.map_err(|e| ApiError::ValidationError {
        field: "conf".to_string(),
        message: e.body_text(),
    })?;
    let conf = params.confidence()?;

    let mut multipart = multipart
        .map_err(|e| ApiError::InvalidRequest(format!("Expected a multipart upload: {}", e)))?;

    let bytes = read_image_upload(&mut multipart, state.max_upload_bytes)
        .await
        .inspect_err(|e| debug!("Upload rejected: {}", e))?;

    let detector = state.detector.clone();
    let quality = state.jpeg_quality;

    tokio::task::spawn_blocking(move || process_image(detector.as_ref(), &bytes, conf, quality))
        .await
        .map_err(|e| ApiError::InternalError(format!("Inference task failed: {}", e)))?
}

fn process_image(
    detector: &dyn Detector,
    bytes: &[u8],
    conf: f32,
    quality: u8,
) -> Result<(Prediction, Vec<u8>), ApiError> {
    let image = decode_image(bytes)?;

    let output = run_inference(detector, &image, conf).map_err(|e| {
        warn!("Inference failed: {:#}", e);
        ApiError::InternalError(format!("Inference failed: {}", e))
    })?;

    let jpeg = encode_jpeg(&output.annotated, quality)?;
    Ok((output.prediction, jpeg))
}
