// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector registry
//!
//! Built once at startup, then frozen into an immutable [`DetectorSnapshot`].
//! Requests take an `Arc` to the current snapshot and keep it for their whole
//! lifetime; a reload swaps the snapshot as a whole.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::provider::{Concurrency, Detector};
use super::types::{DetectionInput, DetectionOutcome, DetectorError, DetectorKind, FailureKind};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Detector '{name}' provides {actual} but was registered as {expected}")]
    KindMismatch {
        expected: DetectorKind,
        actual: DetectorKind,
        name: String,
    },
}

/// A loaded detector plus its invocation policy
#[derive(Clone)]
pub struct DetectorHandle {
    detector: Arc<dyn Detector>,
    gate: Option<Arc<Mutex<()>>>,
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("serialized", &self.gate.is_some())
            .finish()
    }
}

impl DetectorHandle {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        let gate = match detector.concurrency() {
            Concurrency::Serialized => Some(Arc::new(Mutex::new(()))),
            Concurrency::Shared => None,
        };
        Self { detector, gate }
    }

    pub fn kind(&self) -> DetectorKind {
        self.detector.kind()
    }

    pub fn name(&self) -> &str {
        self.detector.name()
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_ready()
    }

    pub fn concurrency(&self) -> Concurrency {
        self.detector.concurrency()
    }

    /// Invoke the detector under a deadline.
    ///
    /// Waiting for a serialized detector's gate counts against `timeout`.
    /// Never returns an error: every failure mode becomes a `Failure` outcome.
    pub async fn invoke(&self, input: &DetectionInput, timeout: Duration) -> DetectionOutcome {
        let kind = self.kind();

        if !self.detector.is_ready() {
            return DetectionOutcome::failure(
                kind,
                FailureKind::NotConfigured,
                format!("Detector '{}' is not ready", self.name()),
            );
        }

        let started = Instant::now();
        let call = async {
            let _permit = match &self.gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };
            self.detector.infer(input).await
        };

        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(payload)) => DetectionOutcome::Success { kind, payload },
            Ok(Err(DetectorError::NotReady(msg))) => {
                DetectionOutcome::failure(kind, FailureKind::NotConfigured, msg)
            }
            Ok(Err(e)) => DetectionOutcome::failure(kind, FailureKind::InferenceError, e.to_string()),
            Err(_) => DetectionOutcome::failure(
                kind,
                FailureKind::Timeout,
                format!("{} did not respond within {}ms", kind, timeout.as_millis()),
            ),
        };

        debug!(
            kind = %kind,
            detector = self.name(),
            success = outcome.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Detector invocation finished"
        );

        outcome
    }
}

/// Registry entry as reported by diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub kind: DetectorKind,
    pub name: Option<String>,
    pub registered: bool,
    pub ready: bool,
    pub concurrency: Option<Concurrency>,
}

/// Immutable view of registered detectors
#[derive(Debug, Clone, Default)]
pub struct DetectorSnapshot {
    handles: BTreeMap<DetectorKind, DetectorHandle>,
}

impl DetectorSnapshot {
    pub fn builder() -> DetectorRegistryBuilder {
        DetectorRegistryBuilder::default()
    }

    pub fn get(&self, kind: DetectorKind) -> Option<&DetectorHandle> {
        self.handles.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DetectorKind> + '_ {
        self.handles.keys().copied()
    }

    pub fn handles(&self) -> impl Iterator<Item = (&DetectorKind, &DetectorHandle)> {
        self.handles.iter()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Kinds with no registered handle
    pub fn missing_kinds(&self) -> Vec<DetectorKind> {
        DetectorKind::ALL
            .iter()
            .copied()
            .filter(|k| !self.handles.contains_key(k))
            .collect()
    }

    /// One entry per kind, registered or not
    pub fn describe(&self) -> Vec<DetectorStatus> {
        DetectorKind::ALL
            .iter()
            .map(|&kind| match self.handles.get(&kind) {
                Some(handle) => DetectorStatus {
                    kind,
                    name: Some(handle.name().to_string()),
                    registered: true,
                    ready: handle.is_ready(),
                    concurrency: Some(handle.concurrency()),
                },
                None => DetectorStatus {
                    kind,
                    name: None,
                    registered: false,
                    ready: false,
                    concurrency: None,
                },
            })
            .collect()
    }
}

/// Collects handles before the snapshot is frozen
#[derive(Debug, Default)]
pub struct DetectorRegistryBuilder {
    handles: BTreeMap<DetectorKind, DetectorHandle>,
}

impl DetectorRegistryBuilder {
    /// Register `handle` under `kind`. Registering a kind again replaces the
    /// earlier handle.
    pub fn register(
        &mut self,
        kind: DetectorKind,
        handle: DetectorHandle,
    ) -> Result<&mut Self, RegistryError> {
        if handle.kind() != kind {
            return Err(RegistryError::KindMismatch {
                expected: kind,
                actual: handle.kind(),
                name: handle.name().to_string(),
            });
        }

        if let Some(previous) = self.handles.insert(kind, handle) {
            warn!(
                kind = %kind,
                previous = previous.name(),
                "Replacing previously registered detector"
            );
        }
        Ok(self)
    }

    /// Register a detector under the kind it reports
    pub fn register_detector(&mut self, detector: Arc<dyn Detector>) -> &mut Self {
        let kind = detector.kind();
        let handle = DetectorHandle::new(detector);
        if let Some(previous) = self.handles.insert(kind, handle) {
            warn!(
                kind = %kind,
                previous = previous.name(),
                "Replacing previously registered detector"
            );
        }
        self
    }

    pub fn build(self) -> DetectorSnapshot {
        DetectorSnapshot {
            handles: self.handles,
        }
    }
}

/// Process-wide holder of the current snapshot
#[derive(Debug, Default)]
pub struct DetectorRegistry {
    current: RwLock<Arc<DetectorSnapshot>>,
}

impl DetectorRegistry {
    pub fn new(snapshot: DetectorSnapshot) -> Self {
        info!(
            registered = snapshot.len(),
            missing = ?snapshot.missing_kinds(),
            "Detector registry initialized"
        );
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot new requests should use
    pub async fn snapshot(&self) -> Arc<DetectorSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Atomically replace the snapshot, returning the previous one.
    ///
    /// Requests already holding the old snapshot finish against it.
    pub async fn replace(&self, snapshot: DetectorSnapshot) -> Arc<DetectorSnapshot> {
        let next = Arc::new(snapshot);
        let mut current = self.current.write().await;
        info!(registered = next.len(), "Detector registry swapped");
        std::mem::replace(&mut *current, next)
    }
}
