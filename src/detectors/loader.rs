// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Builds a detector snapshot from configured model locations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::ocr::OcrDetector;
use super::onnx::{FreshnessClassifier, YoloDetector, YoloParams};
use super::provider::Detector;
use super::registry::DetectorSnapshot;
use super::types::DetectorKind;

/// Where each detector's model lives. Unset entries leave the kind unregistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorModelConfig {
    /// YOLO brand model (ONNX)
    pub brand_model_path: Option<PathBuf>,
    /// Brand class names, one per line
    pub brand_labels_path: Option<PathBuf>,
    /// Freshness CNN (ONNX)
    pub freshness_model_path: Option<PathBuf>,
    /// YOLO item model (ONNX)
    pub item_count_model_path: Option<PathBuf>,
    /// OpenAI-compatible OCR sidecar base URL
    pub ocr_endpoint: Option<String>,
    /// Model name sent to the OCR sidecar
    pub ocr_model: String,
    /// YOLO candidate confidence threshold
    pub yolo_confidence_threshold: f32,
    /// YOLO NMS IoU threshold
    pub yolo_iou_threshold: f32,
}

impl Default for DetectorModelConfig {
    fn default() -> Self {
        Self {
            brand_model_path: None,
            brand_labels_path: None,
            freshness_model_path: None,
            item_count_model_path: None,
            ocr_endpoint: None,
            ocr_model: "qwen3-vl".to_string(),
            yolo_confidence_threshold: 0.25,
            yolo_iou_threshold: 0.45,
        }
    }
}

impl DetectorModelConfig {
    fn yolo_params(&self) -> YoloParams {
        YoloParams {
            confidence_threshold: self.yolo_confidence_threshold,
            iou_threshold: self.yolo_iou_threshold,
            ..YoloParams::default()
        }
    }

    /// Number of detectors this configuration asks for
    pub fn configured_count(&self) -> usize {
        [
            self.brand_model_path.is_some(),
            self.freshness_model_path.is_some(),
            self.item_count_model_path.is_some(),
            self.ocr_endpoint.is_some(),
        ]
        .iter()
        .filter(|&&b| b)
        .count()
    }
}

fn keep(kind: DetectorKind, loaded: anyhow::Result<Arc<dyn Detector>>) -> Option<Arc<dyn Detector>> {
    match loaded {
        Ok(detector) => {
            info!("✅ {} detector loaded ({})", kind, detector.name());
            Some(detector)
        }
        Err(e) => {
            warn!("⚠️ Failed to load {} detector: {:#}", kind, e);
            None
        }
    }
}

/// Load every configured detector.
///
/// Missing or broken models are logged and skipped; their kinds report
/// `NotConfigured` at request time.
pub async fn load_snapshot(config: &DetectorModelConfig) -> DetectorSnapshot {
    let mut builder = DetectorSnapshot::builder();
    let params = config.yolo_params();

    if let Some(path) = config.brand_model_path.clone() {
        let labels = config.brand_labels_path.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            YoloDetector::load(DetectorKind::BrandDetection, path, labels)
                .map(|d| Arc::new(d.with_params(params)) as Arc<dyn Detector>)
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r);
        if let Some(detector) = keep(DetectorKind::BrandDetection, loaded) {
            builder.register_detector(detector);
        }
    }

    if let Some(path) = config.item_count_model_path.clone() {
        let loaded = tokio::task::spawn_blocking(move || {
            YoloDetector::load(DetectorKind::ItemCount, path, None)
                .map(|d| Arc::new(d.with_params(params)) as Arc<dyn Detector>)
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r);
        if let Some(detector) = keep(DetectorKind::ItemCount, loaded) {
            builder.register_detector(detector);
        }
    }

    if let Some(path) = config.freshness_model_path.clone() {
        let loaded = tokio::task::spawn_blocking(move || {
            FreshnessClassifier::load(path).map(|d| Arc::new(d) as Arc<dyn Detector>)
        })
        .await
        .map_err(anyhow::Error::from)
        .and_then(|r| r);
        if let Some(detector) = keep(DetectorKind::FreshnessClassification, loaded) {
            builder.register_detector(detector);
        }
    }

    if let Some(endpoint) = config.ocr_endpoint.as_deref() {
        let loaded = OcrDetector::new(endpoint, &config.ocr_model);
        if let Ok(ref ocr) = loaded {
            if !ocr.health_check().await {
                warn!("OCR sidecar at {} is not answering yet", endpoint);
            }
        }
        let loaded = loaded.map(|d| Arc::new(d) as Arc<dyn Detector>);
        if let Some(detector) = keep(DetectorKind::PriceExpiryExtraction, loaded) {
            builder.register_detector(detector);
        }
    }

    builder.build()
}
