// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction request parsing

use axum_extra::extract::Multipart;
use serde::Deserialize;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::image_utils::{check_size, guess_format, validate_content_type};

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// Confidence threshold used when `conf` is omitted
pub const DEFAULT_CONFIDENCE: f32 = 0.25;

/// Query parameters shared by both predict endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictParams {
    /// Minimum score for a detection to be reported (default: 0.25)
    pub conf: Option<f32>,
}

impl PredictParams {
    /// Effective threshold, clamped into [0, 1]
    ///
    /// # Errors
    /// Non-finite values (NaN, inf) are rejected.
    pub fn confidence(&self) -> Result<f32, ApiError> {
        let conf = self.conf.unwrap_or(DEFAULT_CONFIDENCE);
        if !conf.is_finite() {
            return Err(ApiError::ValidationError {
                field: "conf".to_string(),
                message: "must be a finite number".to_string(),
            });
        }
        Ok(conf.clamp(0.0, 1.0))
    }
}

/// Read the `file` field of a multipart upload
///
/// The declared content type is checked before any of the body is read.
/// The field is then streamed and the read stops as soon as more than
/// `limit` bytes have arrived. Other fields are skipped.
pub async fn read_image_upload(multipart: &mut Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        validate_content_type(field.content_type())?;

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?
        {
            check_size(data.len() + chunk.len(), limit)?;
            data.extend_from_slice(&chunk);
        }

        debug!(
            "Received {:?} upload of {} bytes",
            guess_format(&data),
            data.len()
        );
        return Ok(data);
    }

    Err(ApiError::ValidationError {
        field: UPLOAD_FIELD.to_string(),
        message: "field is required".to_string(),
    })
}
