// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Concurrent dispatch across detector doubles

use crate::common::*;
use fabstir_inspection_node::detectors::{
    Concurrency, DetectionInput, DetectionOutcome, DetectorKind, DetectorSnapshot, FailureKind,
};
use fabstir_inspection_node::inspection::OrchestrationScheduler;
use fabstir_inspection_node::vision::CanonicalImage;
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn input() -> DetectionInput {
    DetectionInput::new(CanonicalImage::from_rgb(RgbImage::new(32, 32)), Vec::new())
}

fn error_kind(outcome: &DetectionOutcome) -> Option<FailureKind> {
    match outcome {
        DetectionOutcome::Failure { error_kind, .. } => Some(*error_kind),
        DetectionOutcome::Success { .. } => None,
    }
}

#[tokio::test]
async fn test_one_outcome_per_registered_kind() {
    let scheduler = OrchestrationScheduler::new(Duration::from_millis(500));
    let outcomes = scheduler.dispatch(&input(), &full_snapshot()).await;

    assert_eq!(outcomes.len(), DetectorKind::ALL.len());
    assert!(outcomes.values().all(|o| o.is_success()));
    for (kind, outcome) in &outcomes {
        assert_eq!(outcome.kind(), *kind);
    }
}

#[tokio::test]
async fn test_failure_does_not_block_others() {
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(Arc::new(FailingDetector {
            kind: DetectorKind::BrandDetection,
        }))
        .register_detector(InstantDetector::new(DetectorKind::ItemCount, objects_payload(&[0.9])));
    let snapshot = builder.build();

    let scheduler = OrchestrationScheduler::new(Duration::from_millis(500));
    let outcomes = scheduler.dispatch(&input(), &snapshot).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(
        error_kind(&outcomes[&DetectorKind::BrandDetection]),
        Some(FailureKind::InferenceError)
    );
    assert!(outcomes[&DetectorKind::ItemCount].is_success());
}

#[tokio::test]
async fn test_hanging_detector_times_out_within_bound() {
    let timeout = Duration::from_millis(200);
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(Arc::new(HangingDetector {
            kind: DetectorKind::PriceExpiryExtraction,
        }))
        .register_detector(InstantDetector::new(DetectorKind::BrandDetection, brand_payload()));
    let snapshot = builder.build();

    let scheduler = OrchestrationScheduler::new(timeout);
    let started = Instant::now();
    let outcomes = scheduler.dispatch(&input(), &snapshot).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_secs(2), "took {:?}", elapsed);
    assert_eq!(
        error_kind(&outcomes[&DetectorKind::PriceExpiryExtraction]),
        Some(FailureKind::Timeout)
    );
    assert!(outcomes[&DetectorKind::BrandDetection].is_success());
}

#[tokio::test]
async fn test_panic_becomes_inference_error() {
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(Arc::new(PanickingDetector {
            kind: DetectorKind::FreshnessClassification,
        }))
        .register_detector(InstantDetector::new(DetectorKind::ItemCount, objects_payload(&[])));
    let snapshot = builder.build();

    let scheduler = OrchestrationScheduler::new(Duration::from_millis(500));
    let outcomes = scheduler.dispatch(&input(), &snapshot).await;

    match &outcomes[&DetectorKind::FreshnessClassification] {
        DetectionOutcome::Failure {
            error_kind,
            message,
            ..
        } => {
            assert_eq!(*error_kind, FailureKind::InferenceError);
            assert_eq!(message, "detector panicked");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(outcomes[&DetectorKind::ItemCount].is_success());
}

#[tokio::test]
async fn test_detectors_run_concurrently() {
    let delay = Duration::from_millis(300);
    let mut builder = DetectorSnapshot::builder();
    for kind in DetectorKind::ALL {
        builder.register_detector(Arc::new(SlowDetector {
            kind,
            delay,
            payload: match kind {
                DetectorKind::BrandDetection => brand_payload(),
                DetectorKind::FreshnessClassification => freshness_payload(),
                DetectorKind::ItemCount => objects_payload(&[0.5]),
                DetectorKind::PriceExpiryExtraction => text_payload(),
            },
            concurrency: Concurrency::Shared,
        }));
    }
    let snapshot = builder.build();

    let scheduler = OrchestrationScheduler::new(Duration::from_secs(5));
    let started = Instant::now();
    let outcomes = scheduler.dispatch(&input(), &snapshot).await;

    assert!(outcomes.values().all(|o| o.is_success()));
    // four sequential calls would take 4 * delay
    assert!(started.elapsed() < delay * 3, "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_dispatch_kinds_only_invokes_requested() {
    let brand = InstantDetector::new(DetectorKind::BrandDetection, brand_payload());
    let counter = InstantDetector::new(DetectorKind::ItemCount, objects_payload(&[0.9]));
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(brand.clone())
        .register_detector(counter.clone());
    let snapshot = builder.build();

    let scheduler = OrchestrationScheduler::default();
    let outcomes = scheduler
        .dispatch_kinds(
            &input(),
            &snapshot,
            &[DetectorKind::ItemCount, DetectorKind::ItemCount, DetectorKind::PriceExpiryExtraction],
        )
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(counter.calls(), 1);
    assert_eq!(brand.calls(), 0);
    assert_eq!(
        error_kind(&outcomes[&DetectorKind::PriceExpiryExtraction]),
        Some(FailureKind::NotConfigured)
    );
}
