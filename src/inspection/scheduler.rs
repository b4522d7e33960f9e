// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Concurrent fan-out of one request to every registered detector

use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::detectors::{DetectionInput, DetectionOutcome, DetectorKind, DetectorSnapshot, FailureKind};

/// Default per-detector deadline
pub const DEFAULT_DETECTOR_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy)]
pub struct OrchestrationScheduler {
    timeout: Duration,
}

impl Default for OrchestrationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DETECTOR_TIMEOUT)
    }
}

impl OrchestrationScheduler {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke every detector in `snapshot` concurrently.
    ///
    /// Returns exactly one outcome per registered kind once all of them have
    /// finished, failed or timed out.
    pub async fn dispatch(
        &self,
        input: &DetectionInput,
        snapshot: &DetectorSnapshot,
    ) -> BTreeMap<DetectorKind, DetectionOutcome> {
        let kinds: Vec<DetectorKind> = snapshot.kinds().collect();
        self.dispatch_kinds(input, snapshot, &kinds).await
    }

    /// Invoke only `kinds`. A requested kind with no handle in `snapshot`
    /// gets a `NotConfigured` failure without spawning anything.
    pub async fn dispatch_kinds(
        &self,
        input: &DetectionInput,
        snapshot: &DetectorSnapshot,
        kinds: &[DetectorKind],
    ) -> BTreeMap<DetectorKind, DetectionOutcome> {
        let started = Instant::now();
        let mut outcomes = BTreeMap::new();
        let mut spawned = Vec::new();

        for &kind in kinds {
            if outcomes.contains_key(&kind) || spawned.iter().any(|(k, _)| *k == kind) {
                continue;
            }
            match snapshot.get(kind) {
                Some(handle) => {
                    let handle = handle.clone();
                    let input = input.clone();
                    let timeout = self.timeout;
                    let task = tokio::spawn(async move { handle.invoke(&input, timeout).await });
                    spawned.push((kind, task));
                }
                None => {
                    outcomes.insert(kind, DetectionOutcome::not_configured(kind));
                }
            }
        }

        let (spawned_kinds, tasks): (Vec<_>, Vec<_>) = spawned.into_iter().unzip();
        let results = join_all(tasks).await;

        for (kind, result) in spawned_kinds.into_iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(kind = %kind, "Detector task aborted: {}", e);
                    DetectionOutcome::failure(
                        kind,
                        FailureKind::InferenceError,
                        if e.is_panic() {
                            "detector panicked".to_string()
                        } else {
                            format!("detector task aborted: {}", e)
                        },
                    )
                }
            };

            if let DetectionOutcome::Failure {
                error_kind,
                message,
                ..
            } = &outcome
            {
                warn!(kind = %kind, error_kind = %error_kind, "Detector failed: {}", message);
            }
            outcomes.insert(kind, outcome);
        }

        debug!(
            detectors = outcomes.len(),
            succeeded = outcomes.values().filter(|o| o.is_success()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );

        outcomes
    }
}
