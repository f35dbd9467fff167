// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated image rendering
//!
//! Burns mask overlays, boxes and `<name> <score>` labels into a copy of
//! the input image. Labels use the bundled DejaVu Sans unless another
//! font file is supplied.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::detector::{InstanceMask, Prediction};

/// Per-class colors, cycled by class id
pub const PALETTE: [[u8; 3]; 20] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [146, 204, 23],
    [61, 219, 134],
    [26, 147, 52],
    [0, 212, 187],
    [44, 153, 168],
    [0, 194, 255],
    [52, 69, 147],
    [100, 115, 255],
    [0, 24, 236],
    [132, 56, 255],
    [82, 0, 133],
    [203, 56, 255],
    [255, 149, 200],
    [255, 55, 199],
];

const MASK_ALPHA: f32 = 0.5;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Color used for a class id
pub fn class_color(class_id: usize) -> Rgb<u8> {
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws detections onto images
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
}

impl Default for Annotator {
    /// Annotator using the bundled label font
    fn default() -> Self {
        Self {
            font: FontArc::try_from_slice(BUNDLED_FONT).ok(),
        }
    }
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .finish()
    }
}

impl Annotator {
    /// Annotator that draws label text with the given TTF/OTF font
    pub fn with_font_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read label font {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .map_err(|_| anyhow::anyhow!("Invalid font file {}", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    /// Render `prediction` onto a copy of `image`
    pub fn render(&self, image: &RgbImage, prediction: &Prediction) -> RgbImage {
        let mut canvas = image.clone();
        let line_width = line_width(canvas.width(), canvas.height());

        // Masks first so boxes and labels stay visible on top
        if let Some(masks) = &prediction.masks {
            for (det, mask) in prediction.boxes.iter().zip(masks) {
                blend_mask(&mut canvas, mask, class_color(det.class_id));
            }
        }

        for det in &prediction.boxes {
            let color = class_color(det.class_id);
            let Some(rect) = box_rect(&canvas, det.xyxy) else {
                continue;
            };

            draw_thick_rect(&mut canvas, rect, color, line_width);

            let label = format!("{} {:.2}", prediction.names.resolve(det.class_id), det.confidence);
            self.draw_label(&mut canvas, rect, &label, color, line_width);
        }

        canvas
    }

    fn draw_label(&self, canvas: &mut RgbImage, rect: Rect, label: &str, color: Rgb<u8>, line_width: u32) {
        let scale = PxScale::from((line_width as f32 * 6.0).max(12.0));
        let (text_w, text_h) = match &self.font {
            Some(font) => text_size(scale, font, label),
            None => ((label.len() as f32 * scale.x * 0.5) as u32, scale.y as u32),
        };

        let tab_w = (text_w + 2 * line_width).min(canvas.width());
        let tab_h = (text_h + 2 * line_width).min(canvas.height());
        if tab_w == 0 || tab_h == 0 {
            return;
        }

        // Above the box when there is room, otherwise just inside it
        let tab_y = if rect.top() >= tab_h as i32 {
            rect.top() - tab_h as i32
        } else {
            rect.top()
        };
        let tab_x = rect.left().min(canvas.width() as i32 - tab_w as i32).max(0);

        draw_filled_rect_mut(canvas, Rect::at(tab_x, tab_y).of_size(tab_w, tab_h), color);

        if let Some(font) = &self.font {
            draw_text_mut(
                canvas,
                LABEL_TEXT_COLOR,
                tab_x + line_width as i32,
                tab_y + line_width as i32,
                scale,
                font,
                label,
            );
        }
    }
}

/// Stroke width scaled to the image size, never below 2 px
pub fn line_width(width: u32, height: u32) -> u32 {
    (((width + height) as f32 / 2.0 * 0.003).round() as u32).max(2)
}

fn box_rect(canvas: &RgbImage, xyxy: [f32; 4]) -> Option<Rect> {
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    if w == 0 || h == 0 {
        return None;
    }

    let x1 = (xyxy[0].floor() as i32).clamp(0, w - 1);
    let y1 = (xyxy[1].floor() as i32).clamp(0, h - 1);
    let x2 = (xyxy[2].ceil() as i32).clamp(0, w - 1);
    let y2 = (xyxy[3].ceil() as i32).clamp(0, h - 1);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(Rect::at(x1, y1).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32))
}

fn draw_thick_rect(canvas: &mut RgbImage, rect: Rect, color: Rgb<u8>, line_width: u32) {
    for inset in 0..line_width {
        let inset = inset as i32;
        let w = rect.width() as i32 - 2 * inset;
        let h = rect.height() as i32 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let inner = Rect::at(rect.left() + inset, rect.top() + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, inner, color);
    }
}

fn blend_mask(canvas: &mut RgbImage, mask: &InstanceMask, color: Rgb<u8>) {
    let (canvas_w, canvas_h) = canvas.dimensions();

    for (mx, my, value) in mask.bitmap.enumerate_pixels() {
        if value[0] == 0 {
            continue;
        }
        let x = mask.left + mx;
        let y = mask.top + my;
        if x >= canvas_w || y >= canvas_h {
            continue;
        }

        let pixel = canvas.get_pixel_mut(x, y);
        for c in 0..3 {
            let blended = pixel[c] as f32 * (1.0 - MASK_ALPHA) + color[c] as f32 * MASK_ALPHA;
            pixel[c] = blended.round() as u8;
        }
    }
}
