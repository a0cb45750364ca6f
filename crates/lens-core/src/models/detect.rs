//! Object detection with a YOLOv8 ONNX export.
//!
//! Expects `{model_dir}/{detection.model}/model.onnx` taking `images`
//! `[1, 3, S, S]` in [0, 1] and producing `[1, 4 + classes, anchors]` where
//! each anchor is `(cx, cy, w, h, class scores...)` in input pixels. The
//! transposed `[1, anchors, 4 + classes]` layout is accepted too. An optional
//! `labels.txt` overrides the COCO class names.

use std::path::Path;
use std::sync::Mutex;

use image::{DynamicImage, GenericImageView};
use ort::session::Session;
use ort::value::Value;

use super::labels::load_labels;
use super::preprocess::{into_ort_parts, letterbox, Letterbox};
use super::session::{first_input_name, load_session, lock, ort_err};
use super::{InferenceParams, ModelAdapter};
use crate::config::DetectionConfig;
use crate::error::InferenceError;
use crate::types::{BoundingBox, Capability, Detection, InferenceResult};

pub const MODEL_FILE: &str = "model.onnx";
pub const LABELS_FILE: &str = "labels.txt";

const CAP: Capability = Capability::Detection;

/// YOLOv8 detector behind a single-flight session lock.
pub struct Detector {
    session: Mutex<Session>,
    input_name: String,
    labels: Vec<String>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl Detector {
    pub fn load(config: &DetectionConfig, model_dir: &Path) -> Result<Self, InferenceError> {
        let dir = model_dir.join(&config.model);
        let session = load_session(&dir.join(MODEL_FILE), CAP)?;
        let input_name = first_input_name(&session, "images");
        let labels = load_labels(&dir.join(LABELS_FILE));
        tracing::info!(model = %config.model, classes = labels.len(), "Detection model loaded");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            labels,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        })
    }
}

impl ModelAdapter for Detector {
    fn capability(&self) -> Capability {
        CAP
    }

    fn infer(
        &self,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> Result<InferenceResult, InferenceError> {
        let threshold = params
            .confidence_threshold
            .unwrap_or(self.confidence_threshold);
        let (width, height) = image.dimensions();
        let (tensor, geometry) = letterbox(image, self.input_size);

        let input = Value::from_array(into_ort_parts(tensor))
            .map_err(ort_err(CAP, "failed to create input tensor"))?;

        let (shape, data) = {
            let mut session = lock(&self.session, CAP)?;
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => input])
                .map_err(ort_err(CAP, "ONNX inference failed"))?;
            let (_, output) = outputs
                .iter()
                .next()
                .ok_or_else(|| InferenceError::failed(CAP, "model produced no outputs"))?;
            let (shape, data) = output
                .try_extract_tensor::<f32>()
                .map_err(ort_err(CAP, "failed to extract output tensor"))?;
            (shape.iter().copied().collect::<Vec<i64>>(), data.to_vec())
        };

        let candidates = decode_yolo_output(
            &shape,
            &data,
            threshold,
            &self.labels,
            geometry,
            (width as f32, height as f32),
        )
        .map_err(|msg| InferenceError::failed(CAP, msg))?;

        let mut objects = non_max_suppression(candidates, self.iou_threshold);
        rank_detections(&mut objects);
        objects.truncate(self.max_detections);

        Ok(InferenceResult::Detection { objects })
    }
}

/// Turn raw YOLO output into thresholded detections in source-image pixels.
pub fn decode_yolo_output(
    shape: &[i64],
    data: &[f32],
    threshold: f32,
    labels: &[String],
    geometry: Letterbox,
    (img_w, img_h): (f32, f32),
) -> Result<Vec<Detection>, String> {
    let [_, a, b] = shape else {
        return Err(format!("unexpected output shape {shape:?}"));
    };
    let (a, b) = (*a as usize, *b as usize);
    if a * b != data.len() {
        return Err(format!("output shape {shape:?} does not match {} values", data.len()));
    }

    // Prefer the axis that matches 4 + label count, then the one that can
    // hold a box plus scores, then the shorter axis.
    let expected = 4 + labels.len();
    let channels_first = if !labels.is_empty() && a == expected {
        true
    } else if !labels.is_empty() && b == expected {
        false
    } else if a <= 4 || b <= 4 {
        b <= 4
    } else {
        a < b
    };
    let (features, anchors) = if channels_first { (a, b) } else { (b, a) };
    if features <= 4 {
        return Err(format!("unexpected output shape {shape:?}"));
    }
    let at = |feature: usize, anchor: usize| {
        if channels_first {
            data[feature * anchors + anchor]
        } else {
            data[anchor * features + feature]
        }
    };

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..features)
            .map(|f| (f - 4, at(f, anchor)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score < threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let (x1, y1) = geometry.unmap(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = geometry.unmap(cx + w / 2.0, cy + h / 2.0);
        let bbox = BoundingBox::new(
            x1.clamp(0.0, img_w),
            y1.clamp(0.0, img_h),
            x2.clamp(0.0, img_w),
            y2.clamp(0.0, img_h),
        );
        if bbox.area() <= 0.0 {
            continue;
        }

        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"));
        detections.push(Detection {
            label,
            confidence: score,
            bbox,
        });
    }
    Ok(detections)
}

/// Class-wise greedy NMS: a box is dropped when a higher-scoring box with the
/// same label overlaps it by more than `iou_threshold`.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    rank_detections(&mut detections);
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.label == det.label && k.bbox.iou(&det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}

/// Descending confidence, ties broken by leftmost box first.
pub fn rank_detections(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.bbox.x1.total_cmp(&b.bbox.x1))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32, x1: f32) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox: BoundingBox::new(x1, 0.0, x1 + 10.0, 10.0),
        }
    }

    fn identity() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        }
    }

    #[test]
    fn test_rank_by_confidence_then_x() {
        let mut dets = vec![
            det("a", 0.6, 50.0),
            det("b", 0.9, 30.0),
            det("c", 0.6, 10.0),
            det("d", 0.6, 30.0),
        ];
        rank_detections(&mut dets);
        let order: Vec<_> = dets.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_nms_is_class_wise() {
        let dets = vec![
            det("dog", 0.9, 0.0),
            det("dog", 0.8, 1.0),
            det("cat", 0.7, 1.0),
            det("dog", 0.6, 100.0),
        ];
        let kept = non_max_suppression(dets, 0.45);
        let labels: Vec<_> = kept.iter().map(|d| (d.label.as_str(), d.confidence)).collect();
        assert_eq!(labels, vec![("dog", 0.9), ("cat", 0.7), ("dog", 0.6)]);
    }

    #[test]
    fn test_decode_channels_first() {
        // 3 anchors, 2 classes -> features = 6, shape [1, 6, 3]
        let labels = vec!["person".to_string(), "dog".to_string()];
        #[rustfmt::skip]
        let data = vec![
            // cx
            20.0, 50.0, 80.0,
            // cy
            20.0, 50.0, 80.0,
            // w
            10.0, 10.0, 10.0,
            // h
            10.0, 10.0, 10.0,
            // person
            0.5, 0.1, 0.2,
            // dog
            0.1, 0.8, 0.49,
        ];
        let dets =
            decode_yolo_output(&[1, 6, 3], &data, 0.5, &labels, identity(), (100.0, 100.0))
                .unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, "person");
        assert_eq!(dets[0].confidence, 0.5);
        assert_eq!(dets[0].bbox, BoundingBox::new(15.0, 15.0, 25.0, 25.0));
        assert_eq!(dets[1].label, "dog");
    }

    #[test]
    fn test_decode_transposed_and_clamped() {
        // shape [1, 8, 5]: 8 anchors of (cx, cy, w, h, score)
        let mut data = vec![0.0; 40];
        data[..5].copy_from_slice(&[5.0, 5.0, 20.0, 20.0, 0.9]);
        let labels = vec!["thing".to_string()];
        let dets =
            decode_yolo_output(&[1, 8, 5], &data, 0.5, &labels, identity(), (50.0, 50.0)).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(0.0, 0.0, 15.0, 15.0));
    }

    #[test]
    fn test_decode_undoes_letterbox() {
        let geometry = Letterbox {
            scale: 0.5,
            pad_x: 0.0,
            pad_y: 10.0,
        };
        let data = vec![20.0, 30.0, 10.0, 10.0, 0.95];
        let dets = decode_yolo_output(
            &[1, 5, 1],
            &data,
            0.5,
            &["x".to_string()],
            geometry,
            (1000.0, 1000.0),
        )
        .unwrap();
        assert_eq!(dets[0].bbox, BoundingBox::new(30.0, 30.0, 50.0, 50.0));
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_yolo_output(&[1, 6], &[0.0; 6], 0.5, &[], identity(), (1.0, 1.0)).is_err());
        assert!(
            decode_yolo_output(&[1, 6, 3], &[0.0; 5], 0.5, &[], identity(), (1.0, 1.0)).is_err()
        );
    }

    #[test]
    fn test_unknown_class_label() {
        let data = vec![5.0, 5.0, 2.0, 2.0, 0.0, 0.7];
        let dets =
            decode_yolo_output(&[1, 6, 1], &data, 0.5, &[], identity(), (10.0, 10.0)).unwrap();
        assert_eq!(dets[0].label, "class_1");
    }
}
