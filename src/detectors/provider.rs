// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector trait definition

use async_trait::async_trait;
use serde::Serialize;

use super::types::{DetectionInput, DetectionPayload, DetectorError, DetectorKind};

/// How concurrent requests may share one detector instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Concurrency {
    /// Safe to call from many requests at once
    Shared,
    /// Calls are queued; one inference at a time
    Serialized,
}

/// Trait for implementing detection capabilities
///
/// Every backend (ONNX model, remote OCR service, test double) implements this
/// trait. The scheduler only ever talks to detectors through it.
#[async_trait]
pub trait Detector: Send + Sync {
    /// The capability this detector provides
    fn kind(&self) -> DetectorKind;

    /// Backend name for logging and diagnostics
    fn name(&self) -> &str;

    /// Whether the detector can serve requests
    ///
    /// A detector that is not ready is reported as not configured without
    /// being invoked.
    fn is_ready(&self) -> bool {
        true
    }

    /// Concurrency contract of the backend
    ///
    /// Default is `Shared`.
    fn concurrency(&self) -> Concurrency {
        Concurrency::Shared
    }

    /// Run detection over the preprocessed image and its regions
    ///
    /// # Arguments
    /// * `input` - Resized image plus candidate regions, shared read-only
    ///
    /// # Returns
    /// A kind-specific payload or an error
    async fn infer(&self, input: &DetectionInput) -> Result<DetectionPayload, DetectorError>;
}
