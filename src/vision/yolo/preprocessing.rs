// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Letterbox preprocessing for YOLO models

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Padding color used by the Ultralytics letterbox
pub const PAD_VALUE: u8 = 114;

/// Mapping between original-image and model-input coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    /// Scale applied to the original image
    pub gain: f32,
    /// Horizontal padding on the left, in input pixels
    pub pad_x: f32,
    /// Vertical padding on the top, in input pixels
    pub pad_y: f32,
    /// Model input size (square)
    pub input_size: u32,
    /// Original image width
    pub orig_width: u32,
    /// Original image height
    pub orig_height: u32,
}

impl LetterboxTransform {
    pub fn new(orig_width: u32, orig_height: u32, input_size: u32) -> Self {
        let gain = if orig_width == 0 || orig_height == 0 {
            1.0
        } else {
            (input_size as f32 / orig_width as f32).min(input_size as f32 / orig_height as f32)
        };

        let (new_w, new_h) = scaled_size(orig_width, orig_height, gain);
        let pad_x = ((input_size - new_w.min(input_size)) / 2) as f32;
        let pad_y = ((input_size - new_h.min(input_size)) / 2) as f32;

        Self {
            gain,
            pad_x,
            pad_y,
            input_size,
            orig_width,
            orig_height,
        }
    }

    /// Input-space point to original-image space (unclipped)
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.gain, (y - self.pad_y) / self.gain)
    }

    /// Original-image point to input space
    pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.gain + self.pad_x, y * self.gain + self.pad_y)
    }

    /// Map an input-space box back to the original image and clip it
    pub fn box_to_original(&self, xyxy: [f32; 4]) -> [f32; 4] {
        let (x1, y1) = self.to_original(xyxy[0], xyxy[1]);
        let (x2, y2) = self.to_original(xyxy[2], xyxy[3]);
        let w = self.orig_width as f32;
        let h = self.orig_height as f32;
        [
            x1.clamp(0.0, w),
            y1.clamp(0.0, h),
            x2.clamp(0.0, w),
            y2.clamp(0.0, h),
        ]
    }
}

fn scaled_size(width: u32, height: u32, gain: f32) -> (u32, u32) {
    (
        ((width as f32 * gain).round() as u32).max(1),
        ((height as f32 * gain).round() as u32).max(1),
    )
}

/// Resize preserving aspect ratio and pad to a centered square
pub fn letterbox(image: &RgbImage, input_size: u32) -> (RgbImage, LetterboxTransform) {
    let transform = LetterboxTransform::new(image.width(), image.height(), input_size);
    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));

    if image.width() == 0 || image.height() == 0 {
        return (canvas, transform);
    }

    let (new_w, new_h) = scaled_size(image.width(), image.height(), transform.gain);
    let new_w = new_w.min(input_size);
    let new_h = new_h.min(input_size);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    imageops::replace(
        &mut canvas,
        &resized,
        transform.pad_x as i64,
        transform.pad_y as i64,
    );

    (canvas, transform)
}

/// Convert a letterboxed image into a normalized NCHW tensor [1, 3, H, W]
pub fn to_nchw_tensor(image: &RgbImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    tensor
}

/// Letterbox and tensorize in one step
pub fn preprocess(image: &RgbImage, input_size: u32) -> (Array4<f32>, LetterboxTransform) {
    let (boxed, transform) = letterbox(image, input_size);
    (to_nchw_tensor(&boxed), transform)
}
