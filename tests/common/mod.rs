// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures for integration tests: detector doubles and image helpers

#![allow(dead_code)]

use async_trait::async_trait;
use fabstir_inspection_node::config::InspectionConfig;
use fabstir_inspection_node::detectors::{
    Concurrency, DetectionInput, DetectionPayload, Detector, DetectorError, DetectorKind,
    DetectorRegistry, DetectorSnapshot, ScoredBox,
};
use fabstir_inspection_node::inspection::InspectionService;
use fabstir_inspection_node::vision::BoundingBox;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns a fixed payload immediately
pub struct InstantDetector {
    pub kind: DetectorKind,
    pub payload: DetectionPayload,
    pub calls: AtomicUsize,
}

impl InstantDetector {
    pub fn new(kind: DetectorKind, payload: DetectionPayload) -> Arc<Self> {
        Arc::new(Self {
            kind,
            payload,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for InstantDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        "instant"
    }

    async fn infer(&self, _input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

/// Always fails with an inference error
pub struct FailingDetector {
    pub kind: DetectorKind,
}

#[async_trait]
impl Detector for FailingDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        "failing"
    }

    async fn infer(&self, _input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        Err(DetectorError::Inference("model exploded".to_string()))
    }
}

/// Panics inside inference
pub struct PanickingDetector {
    pub kind: DetectorKind,
}

#[async_trait]
impl Detector for PanickingDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        "panicking"
    }

    async fn infer(&self, _input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        panic!("detector bug");
    }
}

/// Never completes
pub struct HangingDetector {
    pub kind: DetectorKind,
}

#[async_trait]
impl Detector for HangingDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        "hanging"
    }

    async fn infer(&self, _input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Sleeps before answering
pub struct SlowDetector {
    pub kind: DetectorKind,
    pub delay: Duration,
    pub payload: DetectionPayload,
    pub concurrency: Concurrency,
}

#[async_trait]
impl Detector for SlowDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    fn name(&self) -> &str {
        "slow"
    }

    fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    async fn infer(&self, _input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.payload.clone())
    }
}

/// Emits one object per candidate region
pub struct RegionCounter;

#[async_trait]
impl Detector for RegionCounter {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ItemCount
    }

    fn name(&self) -> &str {
        "region-counter"
    }

    async fn infer(&self, input: &DetectionInput) -> Result<DetectionPayload, DetectorError> {
        Ok(DetectionPayload::Objects(
            input
                .regions
                .iter()
                .map(|region| ScoredBox {
                    label: "item".to_string(),
                    bbox: region.bbox,
                    confidence: 0.9,
                })
                .collect(),
        ))
    }
}

pub fn brand_payload() -> DetectionPayload {
    DetectionPayload::Brands(vec![
        ScoredBox {
            label: "acme".to_string(),
            bbox: BoundingBox::new(10, 20, 30, 40),
            confidence: 0.6,
        },
        ScoredBox {
            label: "globex".to_string(),
            bbox: BoundingBox::new(100, 20, 30, 40),
            confidence: 0.9,
        },
    ])
}

pub fn freshness_payload() -> DetectionPayload {
    DetectionPayload::ClassScores(vec![0.7, 0.2, 0.1])
}

pub fn objects_payload(confidences: &[f32]) -> DetectionPayload {
    DetectionPayload::Objects(
        confidences
            .iter()
            .enumerate()
            .map(|(i, &confidence)| ScoredBox {
                label: "item".to_string(),
                bbox: BoundingBox::new(i as u32 * 10, 0, 8, 8),
                confidence,
            })
            .collect(),
    )
}

pub fn text_payload() -> DetectionPayload {
    DetectionPayload::Text("MRP Rs. 45.00 EXP 12-20-2025".to_string())
}

/// One instant detector per kind
pub fn full_snapshot() -> DetectorSnapshot {
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(InstantDetector::new(DetectorKind::BrandDetection, brand_payload()))
        .register_detector(InstantDetector::new(
            DetectorKind::FreshnessClassification,
            freshness_payload(),
        ))
        .register_detector(InstantDetector::new(
            DetectorKind::ItemCount,
            objects_payload(&[0.9, 0.8, 0.1]),
        ))
        .register_detector(InstantDetector::new(
            DetectorKind::PriceExpiryExtraction,
            text_payload(),
        ));
    builder.build()
}

pub fn test_config(timeout_ms: u64) -> InspectionConfig {
    InspectionConfig {
        detector_timeout_ms: timeout_ms,
        ..InspectionConfig::default()
    }
}

pub fn service_with(snapshot: DetectorSnapshot, timeout_ms: u64) -> InspectionService {
    let registry = Arc::new(DetectorRegistry::new(snapshot));
    InspectionService::new(&test_config(timeout_ms), registry).expect("valid test config")
}

/// Light background with three dark boxes
pub fn shelf_image(width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([230, 230, 230]));
    let box_w = width / 6;
    let box_h = height / 3;
    for i in 0..3 {
        let x0 = width / 12 + i * (width / 3);
        let y0 = height / 3;
        for y in y0..y0 + box_h {
            for x in x0..x0 + box_w {
                img.put_pixel(x, y, Rgb([20, 40, 160]));
            }
        }
    }
    img
}

/// Deterministic noise, compresses poorly
pub fn noise_image(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x2545_F491;
    RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        Rgb([next(), next(), next()])
    })
}

pub fn black_image(width: u32, height: u32) -> RgbImage {
    RgbImage::new(width, height)
}

pub fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("encode test image");
    buf.into_inner()
}

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    encode(img, ImageFormat::Png)
}

pub fn encode_jpeg(img: &RgbImage) -> Vec<u8> {
    encode(img, ImageFormat::Jpeg)
}
