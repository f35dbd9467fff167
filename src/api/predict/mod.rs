// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoints
//!
//! - `POST /api/predict`: JSON detections plus a link to the annotated image
//! - `POST /api/predict-image`: the annotated JPEG inline

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{predict_handler, predict_image_handler};
pub use request::{read_image_upload, PredictParams, DEFAULT_CONFIDENCE, UPLOAD_FIELD};
pub use response::PredictResponse;
