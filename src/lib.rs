// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod inspection;
pub mod version;
pub mod vision;

// Re-export main types
pub use config::InspectionConfig;
pub use detectors::{Detector, DetectorKind, DetectorRegistry, DetectorSnapshot};
pub use inspection::{InspectionReport, InspectionService, InspectionStatus, ReportBuilder};
pub use vision::{ImageIngestor, PreprocessingPipeline, RawImage};
