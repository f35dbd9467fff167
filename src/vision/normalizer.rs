// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Conversion of model predictions into the JSON detection schema

use serde::{Deserialize, Serialize};

use super::detector::Prediction;

/// One detected object as returned by `/api/predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Box as (x1, y1, x2, y2) in original-image pixels
    pub bbox_xyxy: [f32; 4],
    pub class_id: usize,
    /// Resolved name, or the stringified id when the model has none
    pub class_name: String,
    /// Score in [0, 1]
    pub confidence: f32,
    /// Mask outline flattened into x, y pairs (segmentation models only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<f32>>,
}

/// Map a prediction to detections, preserving the model's order
///
/// A polygon is attached only when the prediction carries a mask at the
/// same index.
pub fn normalize(prediction: &Prediction) -> Vec<Detection> {
    prediction
        .boxes
        .iter()
        .enumerate()
        .map(|(index, det)| Detection {
            bbox_xyxy: det.xyxy,
            class_id: det.class_id,
            class_name: prediction.names.resolve(det.class_id),
            confidence: det.confidence,
            polygon: prediction.mask(index).map(|mask| mask.flat_polygon()),
        })
        .collect()
}
