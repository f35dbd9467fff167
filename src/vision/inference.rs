// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Single-shot inference: one `predict` followed by one `plot`

use std::time::Instant;

use anyhow::Result;
use image::RgbImage;
use tracing::info;

use super::detector::{Detector, Prediction};

/// Prediction and the image rendered from it
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub prediction: Prediction,
    pub annotated: RgbImage,
}

/// Run the detector once on `image` and render the result
///
/// Errors from the model are returned as-is; there is no retry.
pub fn run_inference(detector: &dyn Detector, image: &RgbImage, conf: f32) -> Result<InferenceOutput> {
    let start = Instant::now();

    let prediction = detector.predict(image, conf)?;
    let annotated = detector.plot(image, &prediction);

    info!(
        "Inference on {}x{} image: {} detections in {}ms",
        image.width(),
        image.height(),
        prediction.len(),
        start.elapsed().as_millis()
    );

    Ok(InferenceOutput {
        prediction,
        annotated,
    })
}
