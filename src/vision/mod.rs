// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vehicle damage detection
//!
//! This module provides:
//! - Upload validation and image decode/encode
//! - The [`Detector`] boundary and its YOLO/ONNX implementation
//! - Annotated rendering and JSON normalization of predictions
//!
//! Everything here runs on CPU and is synchronous; callers move work onto
//! blocking threads.

pub mod class_names;
pub mod detector;
pub mod image_utils;
pub mod inference;
pub mod normalizer;
pub mod render;
pub mod yolo;

pub use class_names::{ClassNames, ClassNamesError};
pub use detector::{Detector, InstanceMask, Prediction, RawDetection};
pub use image_utils::{decode_image, encode_jpeg, validate_content_type, ImageError};
pub use inference::{run_inference, InferenceOutput};
pub use normalizer::{normalize, Detection};
pub use render::Annotator;
pub use yolo::{YoloConfig, YoloModel};
