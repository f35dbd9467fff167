// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO output decoding, non-maximum suppression and mask extraction
//!
//! Output 0 has shape `[1, 4 + nc + nm, N]`: box center/size in input
//! pixels, `nc` class scores and `nm` mask coefficients per candidate.
//! Segment models add output 1, the mask prototypes `[1, nm, mh, mw]`.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;
use ndarray::{ArrayView1, ArrayView3, ArrayViewD, Axis, Ix3};

use super::preprocessing::LetterboxTransform;
use crate::vision::detector::InstanceMask;

/// Probability above which a mask pixel counts as foreground
pub const MASK_THRESHOLD: f32 = 0.5;

/// Douglas-Peucker tolerance for mask outlines, in pixels
pub const POLYGON_EPSILON: f64 = 1.0;

/// A decoded candidate in model-input coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub xyxy: [f32; 4],
    pub class_id: usize,
    pub confidence: f32,
    /// Mask coefficients (empty for detect-only models)
    pub coeffs: Vec<f32>,
}

impl Candidate {
    pub fn area(&self) -> f32 {
        (self.xyxy[2] - self.xyxy[0]).max(0.0) * (self.xyxy[3] - self.xyxy[1]).max(0.0)
    }

    /// Intersection over union with another candidate
    pub fn iou(&self, other: &Candidate) -> f32 {
        let x1 = self.xyxy[0].max(other.xyxy[0]);
        let y1 = self.xyxy[1].max(other.xyxy[1]);
        let x2 = self.xyxy[2].min(other.xyxy[2]);
        let y2 = self.xyxy[3].min(other.xyxy[3]);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Split the channel count into (classes, mask coefficients)
///
/// `num_mask_coeffs` comes from the prototype tensor (0 without one).
pub fn class_layout(channels: usize, num_mask_coeffs: usize) -> Result<usize> {
    if channels < 4 + num_mask_coeffs + 1 {
        anyhow::bail!(
            "Unexpected output channel count {} for {} mask coefficients",
            channels,
            num_mask_coeffs
        );
    }
    Ok(channels - 4 - num_mask_coeffs)
}

/// Decode raw output into candidates scoring above `conf`
pub fn decode_output(
    output: ArrayViewD<f32>,
    num_classes: usize,
    num_mask_coeffs: usize,
    conf: f32,
) -> Result<Vec<Candidate>> {
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|_| anyhow::anyhow!("Expected 3D detection output"))?;
    let view = output.index_axis(Axis(0), 0);

    let channels = view.shape()[0];
    if channels != 4 + num_classes + num_mask_coeffs {
        anyhow::bail!(
            "Output has {} channels, expected 4 + {} classes + {} mask coefficients",
            channels,
            num_classes,
            num_mask_coeffs
        );
    }

    let num_candidates = view.shape()[1];
    let mut candidates = Vec::new();

    for i in 0..num_candidates {
        let column = view.index_axis(Axis(1), i);
        let Some((class_id, score)) = best_class(column, num_classes) else {
            continue;
        };

        if score <= conf {
            continue;
        }

        let cx = column[0];
        let cy = column[1];
        let w = column[2];
        let h = column[3];

        let coeffs = (0..num_mask_coeffs)
            .map(|k| column[4 + num_classes + k])
            .collect();

        candidates.push(Candidate {
            xyxy: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            class_id,
            confidence: score,
            coeffs,
        });
    }

    Ok(candidates)
}

fn best_class(column: ArrayView1<f32>, num_classes: usize) -> Option<(usize, f32)> {
    (0..num_classes)
        .map(|c| (c, column[4 + c]))
        .filter(|(_, score)| score.is_finite())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

/// Class-aware NMS
///
/// Boxes of different classes never suppress each other. The result is
/// sorted by confidence (highest first) and capped at `max_detections`.
pub fn non_max_suppression(
    candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let mut class_groups: HashMap<usize, Vec<Candidate>> = HashMap::new();
    for candidate in candidates {
        class_groups
            .entry(candidate.class_id)
            .or_default()
            .push(candidate);
    }

    let mut kept = Vec::new();

    for (_, mut group) in class_groups {
        group.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

        let mut suppressed = vec![false; group.len()];
        for i in 0..group.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..group.len() {
                if !suppressed[j] && group[i].iou(&group[j]) > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }

        kept.extend(
            group
                .into_iter()
                .zip(suppressed)
                .filter_map(|(candidate, s)| (!s).then_some(candidate)),
        );
    }

    // Ties broken by class then position so output order is deterministic
    kept.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then(a.class_id.cmp(&b.class_id))
            .then(a.xyxy[0].partial_cmp(&b.xyxy[0]).unwrap_or(Ordering::Equal))
            .then(a.xyxy[1].partial_cmp(&b.xyxy[1]).unwrap_or(Ordering::Equal))
    });
    kept.truncate(max_detections);
    kept
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Linear combination of prototypes for one detection: `coeffs · protos`
pub fn mask_logits(protos: ArrayView3<f32>, coeffs: &[f32]) -> ndarray::Array2<f32> {
    let (nm, mh, mw) = protos.dim();
    let mut logits = ndarray::Array2::<f32>::zeros((mh, mw));
    for (k, coeff) in coeffs.iter().enumerate().take(nm) {
        logits.scaled_add(*coeff, &protos.index_axis(Axis(0), k));
    }
    logits
}

fn sample_bilinear(logits: &ndarray::Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = logits.dim();
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let top = logits[[y0, x0]] * (1.0 - fx) + logits[[y0, x1]] * fx;
    let bottom = logits[[y1, x0]] * (1.0 - fx) + logits[[y1, x1]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Build the box-local mask and outline for one detection
///
/// `box_xyxy` is in original-image space. Each original pixel inside the box
/// samples the prototype-space logits through the letterbox transform.
pub fn decode_mask(
    protos: ArrayView3<f32>,
    coeffs: &[f32],
    box_xyxy: [f32; 4],
    transform: &LetterboxTransform,
) -> InstanceMask {
    let (_, mh, mw) = protos.dim();
    let left = box_xyxy[0].floor().max(0.0) as u32;
    let top = box_xyxy[1].floor().max(0.0) as u32;
    let right = (box_xyxy[2].ceil() as u32).min(transform.orig_width);
    let bottom = (box_xyxy[3].ceil() as u32).min(transform.orig_height);

    let width = right.saturating_sub(left);
    let height = bottom.saturating_sub(top);
    let mut bitmap = GrayImage::new(width, height);

    if width == 0 || height == 0 || mh == 0 || mw == 0 {
        return InstanceMask {
            left,
            top,
            bitmap,
            polygon: Vec::new(),
        };
    }

    let logits = mask_logits(protos, coeffs);
    let scale_x = mw as f32 / transform.input_size as f32;
    let scale_y = mh as f32 / transform.input_size as f32;

    for y in 0..height {
        for x in 0..width {
            // Pixel centers, mapped into prototype space
            let (ix, iy) = transform.to_input((left + x) as f32 + 0.5, (top + y) as f32 + 0.5);
            let px = ix * scale_x - 0.5;
            let py = iy * scale_y - 0.5;
            if sigmoid(sample_bilinear(&logits, px, py)) > MASK_THRESHOLD {
                bitmap.put_pixel(x, y, Luma([255]));
            }
        }
    }

    let polygon = mask_to_polygon(&bitmap, left, top);

    InstanceMask {
        left,
        top,
        bitmap,
        polygon,
    }
}

/// Largest outer contour of a bitmap, simplified, offset into image space
pub fn mask_to_polygon(bitmap: &GrayImage, left: u32, top: u32) -> Vec<[f32; 2]> {
    let contours = find_contours::<i32>(bitmap);

    let Some(largest) = contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .max_by_key(|c| c.points.len())
    else {
        return Vec::new();
    };

    let simplified: Vec<Point<i32>> = if largest.points.len() > 2 {
        approximate_polygon_dp(&largest.points, POLYGON_EPSILON, true)
    } else {
        largest.points
    };

    simplified
        .into_iter()
        .map(|p| [(p.x + left as i32) as f32, (p.y + top as i32) as f32])
        .collect()
}
