// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end YOLO postprocessing on synthetic model outputs
//!
//! Builds output tensors by hand in model-input space, then checks that
//! decoding, NMS, letterbox inversion and mask extraction agree.

use image::{Rgb, RgbImage};
use ndarray::{Array3, ArrayD, Axis, IxDyn};
use vehdamage_api::vision::{
    normalize,
    yolo::postprocessing::{decode_mask, decode_output, non_max_suppression},
    yolo::preprocessing::preprocess,
    ClassNames, Prediction, RawDetection,
};

const INPUT: u32 = 64;
const NUM_CLASSES: usize = 2;

/// Write one candidate column into a `[1, 4 + nc + nm, N]` output
fn set_candidate(
    output: &mut ArrayD<f32>,
    index: usize,
    cxcywh: [f32; 4],
    scores: [f32; NUM_CLASSES],
    coeffs: &[f32],
) {
    for k in 0..4 {
        output[[0, k, index]] = cxcywh[k];
    }
    for (c, s) in scores.iter().enumerate() {
        output[[0, 4 + c, index]] = *s;
    }
    for (m, v) in coeffs.iter().enumerate() {
        output[[0, 4 + NUM_CLASSES + m, index]] = *v;
    }
}

fn segment_output() -> (ArrayD<f32>, Array3<f32>) {
    let mut output = ArrayD::<f32>::zeros(IxDyn(&[1, 4 + NUM_CLASSES + 1, 4]));
    // Strong dent, its near duplicate, a weak scratch and an overlapping scratch
    set_candidate(&mut output, 0, [32.0, 32.0, 32.0, 16.0], [0.9, 0.05], &[1.0]);
    set_candidate(&mut output, 1, [33.0, 32.0, 32.0, 16.0], [0.8, 0.05], &[1.0]);
    set_candidate(&mut output, 2, [10.0, 20.0, 8.0, 8.0], [0.0, 0.3], &[1.0]);
    set_candidate(&mut output, 3, [32.0, 32.0, 32.0, 16.0], [0.1, 0.6], &[1.0]);

    // Prototype at stride 4: foreground where the dent sits in input space
    let mut protos = Array3::<f32>::from_elem((1, 16, 16), -10.0);
    for y in 6..10 {
        for x in 4..12 {
            protos[[0, y, x]] = 10.0;
        }
    }

    (output, protos)
}

fn run(conf: f32) -> Prediction {
    let image = RgbImage::from_pixel(128, 64, Rgb([90, 90, 90]));
    let (tensor, transform) = preprocess(&image, INPUT);
    assert_eq!(tensor.shape(), &[1, 3, 64, 64]);

    let (output, protos) = segment_output();
    let candidates = decode_output(output.view(), NUM_CLASSES, 1, conf).unwrap();
    let candidates = non_max_suppression(candidates, 0.7, 300);

    let protos = protos.view();
    let mut boxes = Vec::new();
    let mut masks = Vec::new();
    for candidate in &candidates {
        let xyxy = transform.box_to_original(candidate.xyxy);
        masks.push(decode_mask(protos, &candidate.coeffs, xyxy, &transform));
        boxes.push(RawDetection {
            xyxy,
            class_id: candidate.class_id,
            confidence: candidate.confidence,
        });
    }

    Prediction {
        boxes,
        masks: Some(masks),
        names: ClassNames::from_metadata("{0: 'dent', 1: 'scratch'}"),
        image_size: image.dimensions(),
    }
}

#[test]
fn test_boxes_map_back_to_original_space() {
    let prediction = run(0.25);

    // Duplicate dent suppressed, overlapping scratch kept (other class)
    let classes: Vec<usize> = prediction.boxes.iter().map(|b| b.class_id).collect();
    assert_eq!(classes, vec![0, 1, 1]);

    // 128x64 -> gain 0.5, pad_y 16: input [16, 24, 48, 40] -> [32, 16, 96, 48]
    let dent = &prediction.boxes[0];
    assert_eq!(dent.confidence, 0.9);
    for (got, want) in dent.xyxy.iter().zip([32.0, 16.0, 96.0, 48.0]) {
        assert!((got - want).abs() < 1e-3, "{:?}", dent.xyxy);
    }
}

#[test]
fn test_boxes_stay_within_image() {
    for det in &run(0.0).boxes {
        assert!(det.xyxy[0] >= 0.0 && det.xyxy[1] >= 0.0);
        assert!(det.xyxy[2] <= 128.0 && det.xyxy[3] <= 64.0);
        assert!(det.xyxy[0] <= det.xyxy[2] && det.xyxy[1] <= det.xyxy[3]);
    }
}

#[test]
fn test_raising_conf_never_adds_detections() {
    let counts: Vec<usize> = [0.1, 0.25, 0.5, 0.7, 0.9]
        .iter()
        .map(|conf| run(*conf).len())
        .collect();

    for pair in counts.windows(2) {
        assert!(pair[1] <= pair[0], "{:?}", counts);
    }
    assert_eq!(counts.first(), Some(&3));
    assert_eq!(counts.last(), Some(&0));
}

#[test]
fn test_dent_mask_polygon_lies_inside_box() {
    let prediction = run(0.25);
    let detections = normalize(&prediction);

    let polygon = detections[0].polygon.as_ref().expect("segment model polygon");
    assert!(polygon.len() >= 8);
    assert_eq!(polygon.len() % 2, 0);

    for point in polygon.chunks(2) {
        assert!(point[0] >= 32.0 && point[0] < 96.0, "x {}", point[0]);
        assert!(point[1] >= 16.0 && point[1] < 48.0, "y {}", point[1]);
    }

    // Mask bitmap covers the box and is mostly foreground
    let mask = prediction.mask(0).unwrap();
    let foreground = mask.bitmap.pixels().filter(|p| p[0] > 0).count();
    let total = (mask.bitmap.width() * mask.bitmap.height()) as usize;
    assert!(foreground * 2 > total, "{} of {}", foreground, total);
}

#[test]
fn test_mask_outside_prototype_region_has_empty_polygon() {
    let prediction = run(0.25);
    let detections = normalize(&prediction);

    // The small scratch sits where every prototype logit is negative
    let small = detections
        .iter()
        .position(|d| d.class_id == 1 && d.confidence < 0.5)
        .unwrap();
    assert_eq!(detections[small].polygon, Some(vec![]));
}

#[test]
fn test_tensor_reads_letterboxed_pixels() {
    let image = RgbImage::from_pixel(128, 64, Rgb([255, 0, 0]));
    let (tensor, _) = preprocess(&image, INPUT);
    let red = tensor.index_axis(Axis(1), 0);

    // Padding rows carry gray 114, image rows are red
    assert!((red[[0, 0, 32]] - 114.0 / 255.0).abs() < 1e-6);
    assert!((red[[0, 32, 32]] - 1.0).abs() < 1e-6);
}
