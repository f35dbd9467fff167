// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! All settings come from environment variables (a `.env` file is loaded
//! first when present). Every variable is optional; the defaults reproduce
//! the fixed values the service has always shipped with.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

/// Default location of the detection weights
pub const DEFAULT_MODEL_PATH: &str = "weights/best.onnx";

/// Default directory for persisted annotated images
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Default upload limit in MiB
pub const DEFAULT_MAX_UPLOAD_MB: usize = 8;

/// Default letterbox size for the model input
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default IoU threshold for non-maximum suppression
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.7;

/// Default cap on detections per image
pub const DEFAULT_MAX_DETECTIONS: usize = 300;

/// Runtime configuration for the HTTP server and the detection model
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Path to the ONNX weights file
    pub model_path: PathBuf,
    /// Directory where annotated images are written and served from
    pub static_dir: PathBuf,
    /// Upload limit in MiB
    pub max_upload_mb: usize,
    /// Optional JSON file with class names (overrides model metadata)
    pub class_names_path: Option<PathBuf>,
    /// Font file overriding the bundled label font
    pub label_font_path: Option<PathBuf>,
    /// Square input size expected by the model
    pub input_size: u32,
    /// NMS IoU threshold
    pub iou_threshold: f32,
    /// Maximum detections returned per image
    pub max_detections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            class_names_path: None,
            label_font_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
        }
    }
}

impl ServerConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: lookup("API_HOST").unwrap_or(defaults.host),
            port: parse_or("API_PORT", lookup("API_PORT"), defaults.port),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            max_upload_mb: parse_or(
                "MAX_UPLOAD_MB",
                lookup("MAX_UPLOAD_MB"),
                defaults.max_upload_mb,
            ),
            class_names_path: lookup("CLASS_NAMES_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            label_font_path: lookup("LABEL_FONT_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            input_size: parse_or(
                "MODEL_INPUT_SIZE",
                lookup("MODEL_INPUT_SIZE"),
                defaults.input_size,
            ),
            iou_threshold: parse_or(
                "IOU_THRESHOLD",
                lookup("IOU_THRESHOLD"),
                defaults.iou_threshold,
            )
            .clamp(0.0, 1.0),
            max_detections: parse_or(
                "MAX_DETECTIONS",
                lookup("MAX_DETECTIONS"),
                defaults.max_detections,
            ),
        }
    }

    /// Upload limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    /// Socket address to bind
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", addr, e))
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Ignoring invalid value for {}: {:?}", key, raw);
                default
            }
        },
        None => default,
    }
}
