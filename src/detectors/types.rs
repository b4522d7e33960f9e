// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Types shared by detector backends, the registry and the scheduler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::vision::{BoundingBox, CanonicalImage, Region};

/// Detection capabilities an inspection can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetectorKind {
    BrandDetection,
    FreshnessClassification,
    ItemCount,
    PriceExpiryExtraction,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::BrandDetection,
        DetectorKind::FreshnessClassification,
        DetectorKind::ItemCount,
        DetectorKind::PriceExpiryExtraction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::BrandDetection => "BrandDetection",
            DetectorKind::FreshnessClassification => "FreshnessClassification",
            DetectorKind::ItemCount => "ItemCount",
            DetectorKind::PriceExpiryExtraction => "PriceExpiryExtraction",
        }
    }

    /// URL path segment, e.g. `item-count`
    pub fn slug(&self) -> &'static str {
        match self {
            DetectorKind::BrandDetection => "brand-detection",
            DetectorKind::FreshnessClassification => "freshness",
            DetectorKind::ItemCount => "item-count",
            DetectorKind::PriceExpiryExtraction => "price-expiry",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorKind {
    type Err = String;

    /// Accepts the variant name or the slug, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        DetectorKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().to_ascii_lowercase() == wanted || k.slug() == wanted)
            .ok_or_else(|| format!("Unknown detector kind: {}", s))
    }
}

/// Why a detector produced no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// No handle registered, or the handle is not ready
    NotConfigured,
    /// Invocation exceeded the per-detector deadline
    Timeout,
    /// The backend returned an error, panicked, or produced an unusable payload
    InferenceError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotConfigured => "NotConfigured",
            FailureKind::Timeout => "Timeout",
            FailureKind::InferenceError => "InferenceError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only input shared by every detector of one request
#[derive(Debug, Clone)]
pub struct DetectionInput {
    /// Resized image; region coordinates refer to this space
    pub image: CanonicalImage,
    pub regions: Arc<Vec<Region>>,
}

impl DetectionInput {
    pub fn new(image: CanonicalImage, regions: Vec<Region>) -> Self {
        Self {
            image,
            regions: Arc::new(regions),
        }
    }
}

/// A labelled box with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBox {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Raw, kind-specific detector output before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionPayload {
    /// Labelled brand boxes
    Brands(Vec<ScoredBox>),
    /// Per-class scores in model order
    ClassScores(Vec<f32>),
    /// Unlabelled or labelled object boxes to be counted
    Objects(Vec<ScoredBox>),
    /// Recognized text
    Text(String),
}

impl DetectionPayload {
    pub fn variant_name(&self) -> &'static str {
        match self {
            DetectionPayload::Brands(_) => "Brands",
            DetectionPayload::ClassScores(_) => "ClassScores",
            DetectionPayload::Objects(_) => "Objects",
            DetectionPayload::Text(_) => "Text",
        }
    }
}

/// Result of invoking one detector for one request
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Success {
        kind: DetectorKind,
        payload: DetectionPayload,
    },
    Failure {
        kind: DetectorKind,
        error_kind: FailureKind,
        message: String,
    },
}

impl DetectionOutcome {
    pub fn failure(kind: DetectorKind, error_kind: FailureKind, message: impl Into<String>) -> Self {
        DetectionOutcome::Failure {
            kind,
            error_kind,
            message: message.into(),
        }
    }

    pub fn not_configured(kind: DetectorKind) -> Self {
        Self::failure(
            kind,
            FailureKind::NotConfigured,
            format!("No detector configured for {}", kind),
        )
    }

    pub fn kind(&self) -> DetectorKind {
        match self {
            DetectionOutcome::Success { kind, .. } | DetectionOutcome::Failure { kind, .. } => *kind,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DetectionOutcome::Success { .. })
    }
}

/// Errors a detector backend may return from `infer`
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector not ready: {0}")]
    NotReady(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
