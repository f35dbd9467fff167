// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::StoreError;
use crate::vision::ImageError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    UnsupportedMediaType,
    PayloadTooLarge { limit_mb: usize },
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    InvalidImage(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, detail) = match self {
            ApiError::UnsupportedMediaType => (
                "unsupported_media_type",
                "Only JPG/PNG images are accepted.".to_string(),
            ),
            ApiError::PayloadTooLarge { limit_mb } => {
                ("payload_too_large", format!("Image > {} MB.", limit_mb))
            }
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone()),
            ApiError::ValidationError { field, message } => {
                ("validation_error", format!("{}: {}", field, message))
            }
            ApiError::InvalidImage(msg) => ("invalid_image", format!("Invalid image: {}", msg)),
            ApiError::InternalError(msg) => ("internal_error", msg.clone()),
        };

        ErrorResponse {
            detail,
            error_type: error_type.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::UnsupportedMediaType => 415,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidImage(_) => 400,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::UnsupportedMediaType => write!(f, "Unsupported media type"),
            ApiError::PayloadTooLarge { limit_mb } => {
                write!(f, "Payload too large (limit {} MB)", limit_mb)
            }
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::UnsupportedMediaType(_) => ApiError::UnsupportedMediaType,
            ImageError::TooLarge(_, limit) => ApiError::PayloadTooLarge {
                limit_mb: limit / (1024 * 1024),
            },
            ImageError::EmptyData => ApiError::InvalidImage("image data is empty".to_string()),
            ImageError::DecodeFailed(msg) => ApiError::InvalidImage(msg),
            ImageError::EncodeFailed(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
