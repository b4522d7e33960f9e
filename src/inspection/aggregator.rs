// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Merges per-detector outcomes into one inspection report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::extraction::{PatternVersion, PriceExpiryDetails, PriceExpiryExtractor};
use crate::detectors::{DetectionOutcome, DetectionPayload, DetectorKind, FailureKind, ScoredBox};

/// Default minimum confidence for a box to be counted
pub const DEFAULT_ITEM_COUNT_CONFIDENCE_FLOOR: f32 = 0.25;

/// Freshness classes in model output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FreshnessLabel {
    Fresh,
    Moderate,
    Spoiled,
}

impl FreshnessLabel {
    pub const ALL: [FreshnessLabel; 3] = [
        FreshnessLabel::Fresh,
        FreshnessLabel::Moderate,
        FreshnessLabel::Spoiled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FreshnessLabel::Fresh => "Fresh",
            FreshnessLabel::Moderate => "Moderate",
            FreshnessLabel::Spoiled => "Spoiled",
        }
    }
}

impl fmt::Display for FreshnessLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of an inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionStatus {
    /// Every requested detector succeeded
    Complete,
    /// Some, but not all, succeeded
    Partial,
    /// None succeeded
    Failed,
}

impl InspectionStatus {
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if total > 0 && succeeded == total {
            InspectionStatus::Complete
        } else if succeeded > 0 {
            InspectionStatus::Partial
        } else {
            InspectionStatus::Failed
        }
    }
}

/// Normalized per-kind result
#[derive(Debug, Clone, PartialEq)]
pub enum InspectionResult {
    /// Brand boxes, highest confidence first
    Brands(Vec<ScoredBox>),
    Freshness {
        label: FreshnessLabel,
        scores: BTreeMap<FreshnessLabel, f32>,
    },
    ItemCount {
        count: usize,
    },
    PriceExpiry(PriceExpiryDetails),
}

/// Why a kind has no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionFailure {
    pub error_kind: FailureKind,
    pub message: String,
}

impl DetectionFailure {
    fn inference(message: impl Into<String>) -> Self {
        Self {
            error_kind: FailureKind::InferenceError,
            message: message.into(),
        }
    }
}

/// Aggregate for one request. Contains every requested kind.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionReport {
    pub status: InspectionStatus,
    pub results: BTreeMap<DetectorKind, Result<InspectionResult, DetectionFailure>>,
}

impl InspectionReport {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }
}

#[derive(Debug, Clone)]
pub struct ResultAggregator {
    item_count_confidence_floor: f32,
    extractor: PriceExpiryExtractor,
}

impl ResultAggregator {
    pub fn new(item_count_confidence_floor: f32, pattern_version: PatternVersion) -> Result<Self, regex::Error> {
        Ok(Self {
            item_count_confidence_floor,
            extractor: PriceExpiryExtractor::new(pattern_version)?,
        })
    }

    pub fn pattern_version(&self) -> PatternVersion {
        self.extractor.version()
    }

    /// Aggregate over the full kind set
    pub fn aggregate(&self, outcomes: BTreeMap<DetectorKind, DetectionOutcome>) -> InspectionReport {
        self.aggregate_for(&DetectorKind::ALL, outcomes)
    }

    /// Aggregate over `kinds`. A kind without an outcome is reported as not
    /// configured; outcomes for kinds outside `kinds` are dropped.
    pub fn aggregate_for(
        &self,
        kinds: &[DetectorKind],
        mut outcomes: BTreeMap<DetectorKind, DetectionOutcome>,
    ) -> InspectionReport {
        let mut results = BTreeMap::new();

        for &kind in kinds {
            let outcome = outcomes
                .remove(&kind)
                .unwrap_or_else(|| DetectionOutcome::not_configured(kind));
            results.insert(kind, self.normalize(kind, outcome));
        }

        if !outcomes.is_empty() {
            debug!(ignored = ?outcomes.keys().collect::<Vec<_>>(), "Dropping outcomes for unrequested kinds");
        }

        let succeeded = results.values().filter(|r| r.is_ok()).count();
        let status = InspectionStatus::from_counts(succeeded, results.len());

        InspectionReport { status, results }
    }

    fn normalize(&self, kind: DetectorKind, outcome: DetectionOutcome) -> Result<InspectionResult, DetectionFailure> {
        let payload = match outcome {
            DetectionOutcome::Success { payload, .. } => payload,
            DetectionOutcome::Failure {
                error_kind,
                message,
                ..
            } => return Err(DetectionFailure { error_kind, message }),
        };

        match (kind, payload) {
            (DetectorKind::BrandDetection, DetectionPayload::Brands(mut brands)) => {
                brands.sort_by(|a, b| {
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(InspectionResult::Brands(brands))
            }
            (DetectorKind::FreshnessClassification, DetectionPayload::ClassScores(scores)) => {
                freshness_from_scores(&scores)
            }
            (DetectorKind::ItemCount, DetectionPayload::Objects(objects)) => {
                let count = objects
                    .iter()
                    .filter(|o| o.confidence >= self.item_count_confidence_floor)
                    .count();
                Ok(InspectionResult::ItemCount { count })
            }
            (DetectorKind::PriceExpiryExtraction, DetectionPayload::Text(text)) => {
                Ok(InspectionResult::PriceExpiry(self.extractor.extract(&text)))
            }
            (kind, payload) => Err(DetectionFailure::inference(format!(
                "{} detector returned an unexpected {} payload",
                kind,
                payload.variant_name()
            ))),
        }
    }
}

fn freshness_from_scores(scores: &[f32]) -> Result<InspectionResult, DetectionFailure> {
    if scores.len() != FreshnessLabel::ALL.len() {
        return Err(DetectionFailure::inference(format!(
            "expected {} freshness scores, got {}",
            FreshnessLabel::ALL.len(),
            scores.len()
        )));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(DetectionFailure::inference("freshness scores are not finite"));
    }

    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }

    Ok(InspectionResult::Freshness {
        label: FreshnessLabel::ALL[best],
        scores: FreshnessLabel::ALL.iter().copied().zip(scores.iter().copied()).collect(),
    })
}
