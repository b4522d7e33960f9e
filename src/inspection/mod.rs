// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request orchestration and result assembly

pub mod aggregator;
pub mod extraction;
pub mod report;
pub mod scheduler;
pub mod service;

pub use aggregator::{
    DetectionFailure, FreshnessLabel, InspectionReport, InspectionResult, InspectionStatus,
    ResultAggregator,
};
pub use extraction::{PatternVersion, PriceExpiryDetails, PriceExpiryExtractor};
pub use report::{BrandEntry, InspectionResponse, ReportBuilder, ResultBody};
pub use scheduler::OrchestrationScheduler;
pub use service::{InspectionError, InspectionService};
