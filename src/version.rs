// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the VehDamage API

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Full version string with feature description
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"), "-onnx-yolov8");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "yolov8-detect",
    "yolov8-segment",
    "mask-polygons",
    "annotated-images",
    "static-links",
    "inline-jpeg",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("VehDamage API {} ({})", VERSION_NUMBER, VERSION)
}
