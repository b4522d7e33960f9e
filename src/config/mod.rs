// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Loaded from environment variables (with `.env` support) or from a TOML
//! file. Every field has a default, so an empty file or environment yields a
//! node that runs the preprocessing chain with no detectors registered.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::detectors::DetectorModelConfig;
use crate::inspection::aggregator::DEFAULT_ITEM_COUNT_CONFIDENCE_FLOOR;
use crate::inspection::extraction::PatternVersion;
use crate::vision::{PipelineConfig, DEFAULT_MAX_IMAGE_BYTES};

/// Result normalization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Boxes below this confidence are not counted
    pub item_count_confidence_floor: f32,
    /// Regex set used for price / expiry extraction
    pub pattern_version: PatternVersion,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            item_count_confidence_floor: DEFAULT_ITEM_COUNT_CONFIDENCE_FLOOR,
            pattern_version: PatternVersion::V1,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// HTTP listen address
    pub listen_addr: String,
    /// Per-detector deadline in milliseconds
    pub detector_timeout_ms: u64,
    /// Upload size limit in bytes
    pub max_image_bytes: usize,
    pub pipeline: PipelineConfig,
    pub aggregation: AggregationConfig,
    pub models: DetectorModelConfig,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            detector_timeout_ms: 5000,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            pipeline: PipelineConfig::default(),
            aggregation: AggregationConfig::default(),
            models: DetectorModelConfig::default(),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("⚠️  Ignoring unparsable {}={:?}, using default", key, raw);
            None
        }
    }
}

impl InspectionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset or unparsable keys keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let pipeline_defaults = PipelineConfig::default();
        let model_defaults = DetectorModelConfig::default();

        Self {
            listen_addr: lookup("INSPECT_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            detector_timeout_ms: parsed(&lookup, "DETECTOR_TIMEOUT_MS")
                .unwrap_or(defaults.detector_timeout_ms),
            max_image_bytes: parsed(&lookup, "MAX_IMAGE_BYTES").unwrap_or(defaults.max_image_bytes),
            pipeline: PipelineConfig {
                target_width: parsed(&lookup, "PIPELINE_TARGET_WIDTH")
                    .unwrap_or(pipeline_defaults.target_width),
                target_height: parsed(&lookup, "PIPELINE_TARGET_HEIGHT")
                    .unwrap_or(pipeline_defaults.target_height),
                canny_low: parsed(&lookup, "PIPELINE_CANNY_LOW").unwrap_or(pipeline_defaults.canny_low),
                canny_high: parsed(&lookup, "PIPELINE_CANNY_HIGH")
                    .unwrap_or(pipeline_defaults.canny_high),
                ..pipeline_defaults
            },
            aggregation: AggregationConfig {
                item_count_confidence_floor: parsed(&lookup, "ITEM_COUNT_CONFIDENCE_FLOOR")
                    .unwrap_or(defaults.aggregation.item_count_confidence_floor),
                pattern_version: parsed(&lookup, "EXTRACTION_PATTERN_VERSION")
                    .unwrap_or(defaults.aggregation.pattern_version),
            },
            models: DetectorModelConfig {
                brand_model_path: lookup("BRAND_MODEL_PATH").map(PathBuf::from),
                brand_labels_path: lookup("BRAND_LABELS_PATH").map(PathBuf::from),
                freshness_model_path: lookup("FRESHNESS_MODEL_PATH").map(PathBuf::from),
                item_count_model_path: lookup("ITEM_COUNT_MODEL_PATH").map(PathBuf::from),
                ocr_endpoint: lookup("OCR_ENDPOINT"),
                ocr_model: lookup("OCR_MODEL").unwrap_or(model_defaults.ocr_model.clone()),
                ..model_defaults
            },
        }
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.detector_timeout_ms == 0 {
            return Err("Detector timeout must be greater than 0".to_string());
        }
        if self.max_image_bytes == 0 {
            return Err("Max image size must be greater than 0".to_string());
        }
        let floor = self.aggregation.item_count_confidence_floor;
        if !(0.0..=1.0).contains(&floor) {
            return Err(format!("Item count confidence floor must be within 0..=1, got {}", floor));
        }
        if self.models.brand_labels_path.is_some() && self.models.brand_model_path.is_none() {
            return Err("Brand labels configured without a brand model".to_string());
        }
        self.pipeline.validate()
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }
}
