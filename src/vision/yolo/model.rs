// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime YOLO detector
//!
//! Loads an Ultralytics YOLOv8 detect or segment export and runs it on CPU.
//! Whether masks are produced is decided by the model: a second output
//! (mask prototypes) turns on segmentation.

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{ArrayD, Axis, Ix4};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::postprocessing::{class_layout, decode_mask, decode_output, non_max_suppression};
use super::preprocessing::preprocess;
use crate::config::{DEFAULT_INPUT_SIZE, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS};
use crate::vision::class_names::ClassNames;
use crate::vision::detector::{Detector, InstanceMask, Prediction, RawDetection};
use crate::vision::render::Annotator;

/// Inference settings that are fixed for the lifetime of the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloConfig {
    /// Square model input size in pixels
    pub input_size: u32,
    /// IoU above which same-class boxes are suppressed
    pub iou_threshold: f32,
    /// Upper bound on detections per image
    pub max_detections: usize,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}

/// YOLOv8 detect/segment model backed by ONNX Runtime
#[derive(Clone)]
pub struct YoloModel {
    session: Arc<Mutex<Session>>,
    input_name: String,
    names: ClassNames,
    config: YoloConfig,
    annotator: Annotator,
}

impl std::fmt::Debug for YoloModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloModel")
            .field("input_name", &self.input_name)
            .field("classes", &self.names.len())
            .field("config", &self.config)
            .field("annotator", &self.annotator)
            .finish_non_exhaustive()
    }
}

impl YoloModel {
    /// Load a YOLO ONNX export
    ///
    /// Class names come from the model's `names` metadata unless
    /// `class_names` is given.
    ///
    /// # Errors
    /// Returns error if the file is missing or ONNX Runtime rejects it.
    pub async fn new<P: AsRef<Path>>(
        model_path: P,
        config: YoloConfig,
        annotator: Annotator,
        class_names: Option<ClassNames>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        if let Some(input) = session.inputs.first() {
            debug!("Detection model input type: {:?}", input.input_type);
        }
        debug!("Detection model has {} outputs", session.outputs.len());

        let names = match class_names {
            Some(names) => names,
            None => Self::names_from_metadata(&session),
        };

        if names.is_empty() {
            warn!("Model carries no class names; numeric ids will be reported");
        }

        info!(
            "✅ Detection model loaded ({} classes, input {}px)",
            names.len(),
            config.input_size
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            names,
            config,
            annotator,
        })
    }

    fn names_from_metadata(session: &Session) -> ClassNames {
        let raw = session
            .metadata()
            .ok()
            .and_then(|metadata| metadata.custom("names").ok().flatten());

        match raw {
            Some(raw) => ClassNames::from_metadata(&raw),
            None => ClassNames::default(),
        }
    }

    /// Run the session and return (detections, optional prototypes) as owned arrays
    fn run_session(&self, tensor: ndarray::Array4<f32>) -> Result<(ArrayD<f32>, Option<ArrayD<f32>>)> {
        let input_value = Value::from_array(tensor).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Detection session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let detections = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract detection output")?
            .to_owned();

        let protos = if outputs.len() > 1 {
            Some(
                outputs[1]
                    .try_extract_array::<f32>()
                    .context("Failed to extract mask prototypes")?
                    .to_owned(),
            )
        } else {
            None
        };

        Ok((detections, protos))
    }
}

impl Detector for YoloModel {
    fn predict(&self, image: &RgbImage, conf: f32) -> Result<Prediction> {
        let (tensor, transform) = preprocess(image, self.config.input_size);
        let (detections, protos) = self.run_session(tensor)?;

        debug!("Detection output shape: {:?}", detections.shape());

        let protos = protos
            .map(|p| {
                p.into_dimensionality::<Ix4>()
                    .map_err(|_| anyhow::anyhow!("Expected 4D mask prototype output"))
            })
            .transpose()?;
        let num_mask_coeffs = protos.as_ref().map(|p| p.shape()[1]).unwrap_or(0);

        let channels = detections
            .shape()
            .get(1)
            .copied()
            .context("Detection output has no channel axis")?;
        let num_classes = class_layout(channels, num_mask_coeffs)?;

        let candidates = decode_output(detections.view(), num_classes, num_mask_coeffs, conf)?;
        let candidates = non_max_suppression(
            candidates,
            self.config.iou_threshold,
            self.config.max_detections,
        );

        let mut boxes = Vec::with_capacity(candidates.len());
        let mut masks: Option<Vec<InstanceMask>> = protos.as_ref().map(|_| Vec::new());

        for candidate in &candidates {
            let xyxy = transform.box_to_original(candidate.xyxy);

            if let (Some(protos), Some(masks)) = (protos.as_ref(), masks.as_mut()) {
                let protos = protos.index_axis(Axis(0), 0);
                masks.push(decode_mask(protos, &candidate.coeffs, xyxy, &transform));
            }

            boxes.push(RawDetection {
                xyxy,
                class_id: candidate.class_id,
                confidence: candidate.confidence,
            });
        }

        debug!("Kept {} detections at conf {:.2}", boxes.len(), conf);

        Ok(Prediction {
            boxes,
            masks,
            names: self.names.clone(),
            image_size: image.dimensions(),
        })
    }

    fn plot(&self, image: &RgbImage, prediction: &Prediction) -> RgbImage {
        self.annotator.render(image, prediction)
    }

    fn names(&self) -> &ClassNames {
        &self.names
    }
}
