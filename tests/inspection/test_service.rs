// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end inspection through the service: ingest, preprocess, dispatch, aggregate

use crate::common::*;
use fabstir_inspection_node::detectors::{DetectorKind, DetectorSnapshot, FailureKind};
use fabstir_inspection_node::inspection::{
    FreshnessLabel, InspectionError, InspectionResult, InspectionStatus, ReportBuilder,
};
use fabstir_inspection_node::vision::{IngestError, RawImage};
use std::sync::Arc;

fn png_upload() -> RawImage {
    RawImage::new(encode_png(&shelf_image(320, 240)), "image/png")
}

#[tokio::test]
async fn test_all_detectors_succeed_gives_complete() {
    let service = service_with(full_snapshot(), 1000);
    let report = service.inspect(png_upload()).await.unwrap();

    assert_eq!(report.status, InspectionStatus::Complete);
    assert_eq!(report.results.len(), DetectorKind::ALL.len());

    match &report.results[&DetectorKind::BrandDetection] {
        Ok(InspectionResult::Brands(brands)) => {
            assert_eq!(brands[0].label, "globex");
            assert_eq!(brands[1].label, "acme");
        }
        other => panic!("unexpected brand result {:?}", other),
    }
    match &report.results[&DetectorKind::FreshnessClassification] {
        Ok(InspectionResult::Freshness { label, scores }) => {
            assert_eq!(*label, FreshnessLabel::Fresh);
            assert_eq!(scores.len(), 3);
        }
        other => panic!("unexpected freshness result {:?}", other),
    }
    // 0.1 falls below the default 0.25 floor
    assert_eq!(
        report.results[&DetectorKind::ItemCount],
        Ok(InspectionResult::ItemCount { count: 2 })
    );
    match &report.results[&DetectorKind::PriceExpiryExtraction] {
        Ok(InspectionResult::PriceExpiry(details)) => {
            assert_eq!(details.mrp_values, vec!["45.00".to_string()]);
            assert!(!details.expiry_dates.is_empty());
        }
        other => panic!("unexpected price/expiry result {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_kinds_give_partial_with_not_configured() {
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(InstantDetector::new(DetectorKind::BrandDetection, brand_payload()))
        .register_detector(InstantDetector::new(
            DetectorKind::FreshnessClassification,
            freshness_payload(),
        ));
    let service = service_with(builder.build(), 1000);

    let report = service.inspect(png_upload()).await.unwrap();

    assert_eq!(report.status, InspectionStatus::Partial);
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.succeeded(), 2);
    for kind in [DetectorKind::ItemCount, DetectorKind::PriceExpiryExtraction] {
        let failure = report.results[&kind].as_ref().unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::NotConfigured);
    }
}

#[tokio::test]
async fn test_empty_registry_gives_failed() {
    let service = service_with(DetectorSnapshot::default(), 1000);
    let report = service.inspect(png_upload()).await.unwrap();

    assert_eq!(report.status, InspectionStatus::Failed);
    assert_eq!(report.results.len(), 4);
    assert!(report.results.values().all(|r| r.is_err()));
}

#[tokio::test]
async fn test_timeout_and_failure_are_reported_per_kind() {
    let mut builder = DetectorSnapshot::builder();
    builder
        .register_detector(Arc::new(HangingDetector {
            kind: DetectorKind::PriceExpiryExtraction,
        }))
        .register_detector(Arc::new(FailingDetector {
            kind: DetectorKind::BrandDetection,
        }))
        .register_detector(InstantDetector::new(
            DetectorKind::FreshnessClassification,
            freshness_payload(),
        ))
        .register_detector(InstantDetector::new(DetectorKind::ItemCount, objects_payload(&[0.9])));
    let service = service_with(builder.build(), 150);

    let report = service.inspect(png_upload()).await.unwrap();

    assert_eq!(report.status, InspectionStatus::Partial);
    let timeout = report.results[&DetectorKind::PriceExpiryExtraction]
        .as_ref()
        .unwrap_err();
    assert_eq!(timeout.error_kind, FailureKind::Timeout);
    let failed = report.results[&DetectorKind::BrandDetection].as_ref().unwrap_err();
    assert_eq!(failed.error_kind, FailureKind::InferenceError);

    let json = ReportBuilder::to_json(&report);
    assert_eq!(json["status"], "Partial");
    assert_eq!(json["results"]["PriceExpiryExtraction"]["errorKind"], "Timeout");
    assert!(json["results"]["FreshnessClassification"]["label"].is_string());
}

#[tokio::test]
async fn test_black_image_counts_zero_and_completes() {
    let mut builder = DetectorSnapshot::builder();
    builder.register_detector(Arc::new(RegionCounter));
    let service = service_with(builder.build(), 1000);

    let raw = RawImage::new(encode_png(&black_image(100, 100)), "image/png");
    let report = service
        .inspect_kinds(raw, &[DetectorKind::ItemCount])
        .await
        .unwrap();

    assert_eq!(report.status, InspectionStatus::Complete);
    assert_eq!(report.results.len(), 1);
    assert_eq!(
        report.results[&DetectorKind::ItemCount],
        Ok(InspectionResult::ItemCount { count: 0 })
    );
}

#[tokio::test]
async fn test_unsupported_mime_is_rejected_before_dispatch() {
    let brand = InstantDetector::new(DetectorKind::BrandDetection, brand_payload());
    let mut builder = DetectorSnapshot::builder();
    builder.register_detector(brand.clone());
    let service = service_with(builder.build(), 1000);

    let raw = RawImage::new(encode_png(&shelf_image(64, 64)), "text/plain");
    let err = service.inspect(raw).await.unwrap_err();

    assert!(matches!(
        err,
        InspectionError::Ingest(IngestError::UnsupportedFormat(_))
    ));
    assert_eq!(brand.calls(), 0);
}

#[tokio::test]
async fn test_undecodable_bytes_are_rejected() {
    let service = service_with(full_snapshot(), 1000);
    let raw = RawImage::new(b"definitely not a png".to_vec(), "image/png");

    let err = service.inspect(raw).await.unwrap_err();
    assert!(matches!(err, InspectionError::Ingest(IngestError::DecodeError(_))));
}

#[tokio::test]
async fn test_jpeg_upload_is_accepted() {
    let service = service_with(full_snapshot(), 1000);
    let raw = RawImage::new(encode_jpeg(&shelf_image(320, 240)), "image/jpeg");

    let report = service.inspect(raw).await.unwrap();
    assert_eq!(report.status, InspectionStatus::Complete);
}

#[tokio::test]
async fn test_registry_swap_applies_to_next_request() {
    let service = service_with(DetectorSnapshot::default(), 1000);
    let before = service.inspect(png_upload()).await.unwrap();
    assert_eq!(before.status, InspectionStatus::Failed);

    let previous = service.registry().replace(full_snapshot()).await;
    assert!(previous.is_empty());

    let after = service.inspect(png_upload()).await.unwrap();
    assert_eq!(after.status, InspectionStatus::Complete);
}
