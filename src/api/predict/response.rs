// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::{Deserialize, Serialize};

use crate::vision::Detection;

/// Body of `POST /api/predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Detections in model order (may be empty)
    pub detections: Vec<Detection>,
    /// Where the annotated JPEG can be fetched, e.g. `/static/<token>.jpg`
    pub annotated_url: String,
}

/// `Content-Disposition` of the inline annotated image
pub const INLINE_DISPOSITION: &str = "inline; filename=\"annotated.jpg\"";
