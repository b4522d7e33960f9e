// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8-style object detector
//!
//! Serves both brand detection (with a label file) and item counting.
//! Input is letterboxed to a square, scaled to [0, 1] and laid out NCHW.
//! Output `[1, 4 + C, N]` rows hold `cx, cy, w, h` followed by per-class
//! scores; the transposed `[1, N, 4 + C]` layout is accepted too.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::{Array4, ArrayD};
use std::path::Path;
use tracing::{debug, info};

use super::session::OnnxSession;
use crate::detectors::provider::{Concurrency, Detector};
use crate::detectors::types::{
    DetectionInput, DetectionPayload, DetectorError, DetectorKind, ScoredBox,
};
use crate::vision::BoundingBox;

/// Default square model input
pub const YOLO_INPUT_SIZE: u32 = 640;

/// Letterbox padding value
const PAD_VALUE: u8 = 114;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloParams {
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: YOLO_INPUT_SIZE,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

/// Maps model-space coordinates back to the source image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl Letterbox {
    /// Convert a centre-format box in model space to a clamped source box
    pub fn to_source(&self, cx: f32, cy: f32, w: f32, h: f32) -> Option<BoundingBox> {
        let max_x = self.source_width as f32;
        let max_y = self.source_height as f32;
        let x1 = ((cx - w / 2.0 - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0 - self.pad_y) / self.scale).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0 - self.pad_x) / self.scale).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0 - self.pad_y) / self.scale).clamp(0.0, max_y);

        let width = (x2 - x1).round() as u32;
        let height = (y2 - y1).round() as u32;
        if width == 0 || height == 0 {
            return None;
        }
        Some(BoundingBox::new(x1.round() as u32, y1.round() as u32, width, height))
    }
}

/// Resize keeping aspect ratio, pad to `size` x `size`, normalize to NCHW [0, 1]
pub fn letterbox(img: &RgbImage, size: u32) -> (Array4<f32>, Letterbox) {
    let (w, h) = img.dimensions();
    let scale = (size as f32 / w as f32).min(size as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            source_width: w,
            source_height: h,
        },
    )
}

/// One decoded candidate in model space, centre format
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    /// `[cx, cy, w, h]`
    pub bbox: [f32; 4],
}

/// Decode a YOLOv8 output tensor, keeping candidates above `conf_threshold`
pub fn decode_output(output: &ArrayD<f32>, conf_threshold: f32) -> Result<Vec<RawDetection>, DetectorError> {
    let shape = output.shape().to_vec();
    let (features, boxes, transposed) = match shape.as_slice() {
        [1, a, b] if *a >= 5 && a <= b => (*a, *b, false),
        [1, a, b] if *b >= 5 => (*b, *a, true),
        _ => {
            return Err(DetectorError::InvalidOutput(format!(
                "expected [1, 4 + classes, boxes], got {:?}",
                shape
            )))
        }
    };
    let classes = features - 4;

    let at = |f: usize, i: usize| -> f32 {
        if transposed {
            output[[0, i, f]]
        } else {
            output[[0, f, i]]
        }
    };

    let mut detections = Vec::new();
    for i in 0..boxes {
        let mut best = 0.0f32;
        let mut best_class = 0;
        for c in 0..classes {
            let score = at(4 + c, i);
            if score > best {
                best = score;
                best_class = c;
            }
        }
        if best > conf_threshold {
            detections.push(RawDetection {
                class_id: best_class,
                confidence: best,
                bbox: [at(0, i), at(1, i), at(2, i), at(3, i)],
            });
        }
    }

    Ok(detections)
}

/// Intersection over union of two centre-format boxes
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let (ax1, ay1, ax2, ay2) = (a[0] - a[2] / 2.0, a[1] - a[3] / 2.0, a[0] + a[2] / 2.0, a[1] + a[3] / 2.0);
    let (bx1, by1, bx2, by2) = (b[0] - b[2] / 2.0, b[1] - b[3] / 2.0, b[0] + b[2] / 2.0, b[1] + b[3] / 2.0);

    let intersection = (ax2.min(bx2) - ax1.max(bx1)).max(0.0) * (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let union = a[2] * a[3] + b[2] * b[3] - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Class-aware non-maximum suppression, highest confidence first
pub fn nms(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && iou(&kept.bbox, &candidate.bbox) > iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

/// Read a label file, one class name per line
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels from {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Full postprocess: decode, suppress, map back and label
pub fn postprocess(
    output: &ArrayD<f32>,
    letterbox: &Letterbox,
    params: &YoloParams,
    labels: &[String],
) -> Result<Vec<ScoredBox>, DetectorError> {
    let decoded = decode_output(output, params.confidence_threshold)?;
    let kept = nms(decoded, params.iou_threshold);

    Ok(kept
        .into_iter()
        .filter_map(|d| {
            let [cx, cy, w, h] = d.bbox;
            letterbox.to_source(cx, cy, w, h).map(|bbox| ScoredBox {
                label: labels
                    .get(d.class_id)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{}", d.class_id)),
                bbox,
                confidence: d.confidence,
            })
        })
        .collect())
}

/// ONNX YOLO model bound to one detector kind
#[derive(Debug, Clone)]
pub struct YoloDetector {
    kind: DetectorKind,
    session: OnnxSession,
    labels: Vec<String>,
    params: YoloParams,
}

impl YoloDetector {
    /// Load a YOLO model for `kind` (brand detection or item count)
    pub fn load<P: AsRef<Path>>(kind: DetectorKind, model_path: P, labels_path: Option<P>) -> Result<Self> {
        if !matches!(kind, DetectorKind::BrandDetection | DetectorKind::ItemCount) {
            anyhow::bail!("YOLO detector cannot serve {}", kind);
        }

        let session = OnnxSession::load(model_path)?;
        let labels = match labels_path {
            Some(path) => load_labels(path)?,
            None => Vec::new(),
        };

        info!(
            kind = %kind,
            model = session.model_name(),
            labels = labels.len(),
            "YOLO detector ready"
        );

        Ok(Self {
            kind,
            session,
            labels,
            params: YoloParams::default(),
        })
    }

    pub fn with_params(mut self, params: YoloParams) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl Detector for YoloDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.session.model_name()
    }

    fn concurrency(&self) -> Concurrency {
        Concurrency::Serialized
    }

    async fn infer(&self, input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        let image = input.image.shared_pixels();
        let session = self.session.clone();
        let params = self.params;
        let labels = self.labels.clone();

        let boxes = tokio::task::spawn_blocking(move || {
            let (tensor, transform) = letterbox(&image, params.input_size);
            let output = session.run(tensor)?;
            postprocess(&output, &transform, &params, &labels)
        })
        .await
        .map_err(|e| DetectorError::Inference(format!("YOLO task failed: {}", e)))??;

        debug!(kind = %self.kind, boxes = boxes.len(), "YOLO inference complete");

        Ok(match self.kind {
            DetectorKind::BrandDetection => DetectionPayload::Brands(boxes),
            _ => DetectionPayload::Objects(boxes),
        })
    }
}
