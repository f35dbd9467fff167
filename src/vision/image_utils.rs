// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload validation, image decoding and JPEG encoding

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader, RgbImage};
use thiserror::Error;

/// Maximum upload size (8 MiB)
pub const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// JPEG quality used for annotated images
pub const JPEG_QUALITY: u8 = 85;

/// Content types accepted for uploads
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Errors raised while validating, decoding or encoding images
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Failed to encode image: {0}")]
    EncodeFailed(String),
}

/// Check a declared content type against the allow-list
///
/// Parameters such as `; charset=...` are ignored and the comparison is
/// case-insensitive. Returns the normalized essence on success.
pub fn validate_content_type(content_type: Option<&str>) -> Result<&'static str, ImageError> {
    let declared = content_type.unwrap_or("");
    let essence = declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|allowed| **allowed == essence)
        .copied()
        .ok_or_else(|| {
            let shown = if declared.is_empty() {
                "none".to_string()
            } else {
                declared.to_string()
            };
            ImageError::UnsupportedMediaType(shown)
        })
}

/// Reject payloads over `limit` bytes
pub fn check_size(len: usize, limit: usize) -> Result<(), ImageError> {
    if len > limit {
        return Err(ImageError::TooLarge(len, limit));
    }
    Ok(())
}

/// Decode uploaded bytes into an RGB pixel grid
///
/// The format is detected from the content, not from the declared type.
/// Alpha and any extra channels are discarded.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    if reader.format().is_none() {
        return Err(ImageError::DecodeFailed(
            "unrecognized image format".to_string(),
        ));
    }

    let image = reader
        .decode()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    Ok(image.into_rgb8())
}

/// Encode an RGB pixel grid as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode_image(image)
        .map_err(|e| ImageError::EncodeFailed(e.to_string()))?;
    Ok(buffer)
}

/// Guess the format of raw bytes (used for logging)
pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}
