// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection model boundary
//!
//! The HTTP layer only talks to a [`Detector`]. The ONNX implementation
//! lives in [`crate::vision::yolo`]; tests plug in their own.

use image::{GrayImage, RgbImage};

use super::class_names::ClassNames;
use super::render::Annotator;

/// One object reported by the model, in original-image pixel space
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Box as (x1, y1, x2, y2)
    pub xyxy: [f32; 4],
    /// Class index
    pub class_id: usize,
    /// Score in [0, 1]
    pub confidence: f32,
}

/// Segmentation mask for one detection
///
/// `bitmap` covers only the detection's box; its top-left pixel sits at
/// (`left`, `top`) in the original image. Non-zero pixels are foreground.
#[derive(Debug, Clone)]
pub struct InstanceMask {
    pub left: u32,
    pub top: u32,
    pub bitmap: GrayImage,
    /// Outline points in original-image pixel space
    pub polygon: Vec<[f32; 2]>,
}

impl InstanceMask {
    /// Polygon flattened into alternating x, y values
    pub fn flat_polygon(&self) -> Vec<f32> {
        self.polygon.iter().flat_map(|[x, y]| [*x, *y]).collect()
    }
}

/// Result of one `predict` call
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Detections in the model's native order
    pub boxes: Vec<RawDetection>,
    /// Index-aligned masks, only when the model produced them
    pub masks: Option<Vec<InstanceMask>>,
    /// Id to name mapping of the model
    pub names: ClassNames,
    /// (width, height) of the image the prediction refers to
    pub image_size: (u32, u32),
}

impl Prediction {
    pub fn empty(names: ClassNames, image_size: (u32, u32)) -> Self {
        Self {
            boxes: Vec::new(),
            masks: None,
            names,
            image_size,
        }
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Mask for detection `index`, if one exists
    pub fn mask(&self, index: usize) -> Option<&InstanceMask> {
        self.masks.as_ref().and_then(|masks| masks.get(index))
    }
}

/// A loaded detection model
///
/// Implementations are built once at startup and shared read-only between
/// requests, so they must be `Send + Sync`.
pub trait Detector: Send + Sync {
    /// Run one inference pass; detections scoring at or below `conf` are dropped
    fn predict(&self, image: &RgbImage, conf: f32) -> anyhow::Result<Prediction>;

    /// Render `prediction` onto a copy of `image`
    fn plot(&self, image: &RgbImage, prediction: &Prediction) -> RgbImage {
        Annotator::default().render(image, prediction)
    }

    /// Class names known to the model
    fn names(&self) -> &ClassNames;
}
