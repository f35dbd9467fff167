// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 detection and instance segmentation via ONNX Runtime
//!
//! - `preprocessing`: letterbox resize and NCHW tensor conversion
//! - `postprocessing`: output decoding, NMS, mask and polygon extraction
//! - `model`: the [`YoloModel`] detector

pub mod model;
pub mod postprocessing;
pub mod preprocessing;

pub use model::{YoloConfig, YoloModel};
pub use postprocessing::{non_max_suppression, Candidate};
pub use preprocessing::{letterbox, LetterboxTransform};
