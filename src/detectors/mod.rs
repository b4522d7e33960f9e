// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection capabilities
//!
//! Every backend implements [`Detector`]. Loaded detectors are collected in a
//! [`DetectorSnapshot`] and served through the process-wide
//! [`DetectorRegistry`].

pub mod loader;
pub mod ocr;
pub mod onnx;
pub mod provider;
pub mod registry;
pub mod types;

pub use loader::{load_snapshot, DetectorModelConfig};
pub use ocr::OcrDetector;
pub use provider::{Concurrency, Detector};
pub use registry::{
    DetectorHandle, DetectorRegistry, DetectorRegistryBuilder, DetectorSnapshot, DetectorStatus,
    RegistryError,
};
pub use types::{
    DetectionInput, DetectionOutcome, DetectionPayload, DetectorError, DetectorKind, FailureKind,
    ScoredBox,
};
