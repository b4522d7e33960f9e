// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Preprocessing chain observed through the service

use crate::common::*;
use fabstir_inspection_node::detectors::DetectorSnapshot;
use fabstir_inspection_node::vision::{RawImage, Stage};

#[tokio::test]
async fn test_every_stage_is_retrievable() {
    let service = service_with(DetectorSnapshot::default(), 1000);
    let raw = RawImage::new(encode_png(&shelf_image(400, 300)), "image/png");

    let output = service.preprocess(raw).await.unwrap();

    assert_eq!(output.artifacts.len(), Stage::ALL.len());
    for stage in Stage::ALL {
        let artifact = output.artifact(stage).unwrap();
        let png = artifact.buffer.to_png().unwrap();
        assert!(!png.is_empty(), "stage {} produced an empty PNG", stage);
    }

    let original = output.artifact(Stage::Original).unwrap();
    assert_eq!(original.buffer.dimensions(), (400, 300));
    let resized = output.resized().unwrap();
    assert_eq!((resized.width(), resized.height()), (1024, 768));
}

#[tokio::test]
async fn test_shelf_boxes_produce_regions_inside_the_frame() {
    let service = service_with(DetectorSnapshot::default(), 1000);
    let raw = RawImage::new(encode_png(&shelf_image(400, 300)), "image/png");

    let output = service.preprocess(raw).await.unwrap();

    assert!(!output.regions.is_empty());
    for region in &output.regions {
        let b = region.bbox;
        assert!(b.width > 0 && b.height > 0);
        assert!(b.x + b.width <= 1024);
        assert!(b.y + b.height <= 768);
    }
}

#[tokio::test]
async fn test_black_image_yields_no_regions() {
    let service = service_with(DetectorSnapshot::default(), 1000);
    let raw = RawImage::new(encode_png(&black_image(100, 100)), "image/png");

    let output = service.preprocess(raw).await.unwrap();

    assert!(output.regions.is_empty());
    assert_eq!(output.artifacts.len(), Stage::ALL.len());
}

#[tokio::test]
async fn test_same_upload_gives_same_regions() {
    let service = service_with(DetectorSnapshot::default(), 1000);
    let bytes = encode_png(&shelf_image(400, 300));

    let first = service
        .preprocess(RawImage::new(bytes.clone(), "image/png"))
        .await
        .unwrap();
    let second = service
        .preprocess(RawImage::new(bytes, "image/png"))
        .await
        .unwrap();

    assert_eq!(first.regions, second.regions);
}
