// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Renders an inspection report into the external response shape

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::aggregator::{
    DetectionFailure, FreshnessLabel, InspectionReport, InspectionResult, InspectionStatus,
};
use super::extraction::PriceExpiryDetails;
use crate::detectors::{DetectorKind, FailureKind};

/// Top-level response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionResponse {
    pub status: InspectionStatus,
    pub results: BTreeMap<DetectorKind, ResultBody>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandEntry {
    pub label: String,
    /// `[x, y, width, height]` in resized-image pixels
    #[serde(rename = "box")]
    pub bbox: [u32; 4],
    pub confidence: f32,
}

/// Per-kind body: the normalized result, or the reason there is none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultBody {
    Brands {
        brands: Vec<BrandEntry>,
    },
    Freshness {
        label: FreshnessLabel,
        scores: BTreeMap<FreshnessLabel, f32>,
    },
    Count {
        count: usize,
    },
    PriceExpiry(PriceExpiryDetails),
    Error {
        error: String,
        #[serde(rename = "errorKind")]
        error_kind: FailureKind,
    },
}

impl ResultBody {
    pub fn is_error(&self) -> bool {
        matches!(self, ResultBody::Error { .. })
    }
}

impl From<&InspectionResult> for ResultBody {
    fn from(result: &InspectionResult) -> Self {
        match result {
            InspectionResult::Brands(brands) => ResultBody::Brands {
                brands: brands
                    .iter()
                    .map(|b| BrandEntry {
                        label: b.label.clone(),
                        bbox: b.bbox.to_array(),
                        confidence: b.confidence,
                    })
                    .collect(),
            },
            InspectionResult::Freshness { label, scores } => ResultBody::Freshness {
                label: *label,
                scores: scores.clone(),
            },
            InspectionResult::ItemCount { count } => ResultBody::Count { count: *count },
            InspectionResult::PriceExpiry(details) => ResultBody::PriceExpiry(details.clone()),
        }
    }
}

impl From<&DetectionFailure> for ResultBody {
    fn from(failure: &DetectionFailure) -> Self {
        ResultBody::Error {
            error: failure.message.clone(),
            error_kind: failure.error_kind,
        }
    }
}

/// Stateless renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn render(report: &InspectionReport) -> InspectionResponse {
        InspectionResponse {
            status: report.status,
            results: report
                .results
                .iter()
                .map(|(kind, result)| {
                    let body = match result {
                        Ok(ok) => ResultBody::from(ok),
                        Err(failure) => ResultBody::from(failure),
                    };
                    (*kind, body)
                })
                .collect(),
        }
    }

    pub fn to_json(report: &InspectionReport) -> serde_json::Value {
        serde_json::to_value(Self::render(report)).unwrap_or_else(|e| {
            serde_json::json!({ "status": "Failed", "error": e.to_string() })
        })
    }
}
