// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Freshness classifier (three-class CNN exported to ONNX)

use anyhow::Result;
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use std::path::Path;
use tracing::{debug, info};

use super::session::OnnxSession;
use crate::detectors::provider::{Concurrency, Detector};
use crate::detectors::types::{DetectionInput, DetectionPayload, DetectorError, DetectorKind};

/// Square input side of the classifier
pub const FRESHNESS_INPUT_SIZE: u32 = 128;

/// Resize to `size` x `size` and lay out as NHWC `[1, size, size, 3]` in [0, 1].
///
/// Channels are written in BGR order, which is what the model was trained on.
pub fn preprocess(img: &RgbImage, size: u32) -> Array4<f32> {
    let resized = imageops::resize(img, size, size, FilterType::Triangle);
    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, side, side, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, y, x, 0]] = pixel[2] as f32 / 255.0;
        tensor[[0, y, x, 1]] = pixel[1] as f32 / 255.0;
        tensor[[0, y, x, 2]] = pixel[0] as f32 / 255.0;
    }
    tensor
}

/// Apply softmax to convert logits to probabilities
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_values: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exp_values.iter().sum();
    exp_values.iter().map(|&x| x / sum).collect()
}

/// Scores pass through when they already form a distribution
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    if in_range && (sum - 1.0).abs() < 1e-3 {
        scores.to_vec()
    } else {
        softmax(scores)
    }
}

#[derive(Debug, Clone)]
pub struct FreshnessClassifier {
    session: OnnxSession,
    input_size: u32,
}

impl FreshnessClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = OnnxSession::load(model_path)?;
        info!(model = session.model_name(), "Freshness classifier ready");
        Ok(Self {
            session,
            input_size: FRESHNESS_INPUT_SIZE,
        })
    }
}

#[async_trait]
impl Detector for FreshnessClassifier {
    fn kind(&self) -> DetectorKind {
        DetectorKind::FreshnessClassification
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
        let size = self.input_size;

        let scores = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, DetectorError> {
            let output = session.run(preprocess(&image, size))?;
            Ok(output.iter().copied().collect())
        })
        .await
        .map_err(|e| DetectorError::Inference(format!("classifier task failed: {}", e)))??;

        if scores.is_empty() {
            return Err(DetectorError::InvalidOutput(
                "classifier returned no scores".to_string(),
            ));
        }

        let probabilities = to_probabilities(&scores);
        debug!(scores = ?probabilities, "Freshness inference complete");
        Ok(DetectionPayload::ClassScores(probabilities))
    }
}
