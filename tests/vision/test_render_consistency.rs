// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! The annotated image and the JSON detections describe the same objects

use anyhow::Result;
use image::{Rgb, RgbImage};
use vehdamage_api::vision::{
    normalize,
    render::{class_color, line_width},
    run_inference, ClassNames, Detector, Prediction, RawDetection,
};

struct FixedDetector {
    names: ClassNames,
    boxes: Vec<RawDetection>,
}

impl Detector for FixedDetector {
    fn predict(&self, image: &RgbImage, conf: f32) -> Result<Prediction> {
        let mut prediction = Prediction::empty(self.names.clone(), image.dimensions());
        prediction.boxes = self
            .boxes
            .iter()
            .filter(|b| b.confidence > conf)
            .cloned()
            .collect();
        Ok(prediction)
    }

    fn names(&self) -> &ClassNames {
        &self.names
    }
}

fn detector() -> FixedDetector {
    FixedDetector {
        names: ClassNames::from_metadata("{0: 'dent', 1: 'scratch', 2: 'crack'}"),
        boxes: vec![
            RawDetection {
                xyxy: [20.0, 40.0, 60.0, 100.0],
                class_id: 0,
                confidence: 0.9,
            },
            RawDetection {
                xyxy: [120.0, 140.0, 180.0, 190.0],
                class_id: 2,
                confidence: 0.4,
            },
        ],
    }
}

#[test]
fn test_every_reported_class_has_an_overlay() {
    let image = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
    let output = run_inference(&detector(), &image, 0.25).unwrap();
    let detections = normalize(&output.prediction);

    assert_eq!(detections.len(), 2);
    for det in &detections {
        let x = det.bbox_xyxy[0] as u32;
        let y = ((det.bbox_xyxy[1] + det.bbox_xyxy[3]) / 2.0) as u32;
        assert_eq!(
            output.annotated.get_pixel(x, y),
            &class_color(det.class_id),
            "class {} at ({}, {})",
            det.class_name,
            x,
            y
        );
    }
}

#[test]
fn test_filtered_detection_has_no_overlay() {
    let image = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
    let output = run_inference(&detector(), &image, 0.5).unwrap();

    assert_eq!(normalize(&output.prediction).len(), 1);
    assert_eq!(output.annotated.get_pixel(120, 165), &Rgb([0, 0, 0]));
}

#[test]
fn test_boxes_are_drawn_with_scaled_width() {
    let image = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
    let output = run_inference(&detector(), &image, 0.25).unwrap();
    let width = line_width(200, 200);

    let color = class_color(0);
    for inset in 0..width {
        assert_eq!(output.annotated.get_pixel(20 + inset, 70), &color);
    }
    assert_eq!(output.annotated.get_pixel(20 + width, 70), &Rgb([0, 0, 0]));
}
