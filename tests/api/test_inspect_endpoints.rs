// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! HTTP surface exercised through the router without binding a socket

use crate::common::*;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use fabstir_inspection_node::api::{create_router, AppState, REGION_COUNT_HEADER};
use fabstir_inspection_node::detectors::DetectorSnapshot;
use std::sync::Arc;
use tower::util::ServiceExt;

const BOUNDARY: &str = "inspect-test-boundary";

fn app(snapshot: DetectorSnapshot) -> Router {
    create_router(AppState {
        service: Arc::new(service_with(snapshot, 1000)),
    })
}

fn multipart_body(content_type: Option<&str>, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"shelf.png\"\r\n",
    );
    if let Some(ct) = content_type {
        body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload(uri: &str, content_type: Option<&str>, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(content_type, bytes)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_missing_detectors() {
    let response = app(DetectorSnapshot::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "no_detectors");
    assert_eq!(json["registeredDetectors"], 0);
    assert_eq!(json["missingDetectors"].as_array().unwrap().len(), 4);
    assert!(json["version"]["version"].is_string());
}

#[tokio::test]
async fn test_detectors_lists_every_kind() {
    let response = app(full_snapshot())
        .oneshot(
            Request::builder()
                .uri("/v1/detectors")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let detectors = json["detectors"].as_array().unwrap();
    assert_eq!(detectors.len(), 4);
    assert!(detectors.iter().all(|d| d["registered"] == true));
}

#[tokio::test]
async fn test_inspect_returns_report() {
    let png = encode_png(&shelf_image(320, 240));
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "Complete");
    assert_eq!(json["results"]["ItemCount"]["count"], 2);
    assert_eq!(json["results"]["BrandDetection"]["brands"][0]["label"], "globex");
    assert_eq!(
        json["results"]["BrandDetection"]["brands"][0]["box"],
        serde_json::json!([100, 20, 30, 40])
    );
    assert_eq!(json["results"]["FreshnessClassification"]["label"], "Fresh");
}

#[tokio::test]
async fn test_inspect_without_detectors_reports_not_configured() {
    let png = encode_png(&shelf_image(320, 240));
    let response = app(DetectorSnapshot::default())
        .oneshot(upload("/v1/inspect", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "Failed");
    assert_eq!(json["results"]["BrandDetection"]["errorKind"], "NotConfigured");
}

#[tokio::test]
async fn test_inspect_rejects_text_plain_with_415() {
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect", Some("text/plain"), b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = json_body(response).await;
    assert_eq!(json["error_type"], "unsupported_media_type");
}

#[tokio::test]
async fn test_inspect_rejects_image_jpg_alias_with_415() {
    let jpeg = encode_jpeg(&shelf_image(64, 64));
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect", Some("image/jpg"), &jpeg))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_inspect_without_part_content_type_is_415() {
    let png = encode_png(&shelf_image(64, 64));
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect", None, &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_inspect_rejects_garbage_with_400() {
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect", Some("image/png"), b"not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inspect_single_kind_by_slug() {
    let png = encode_png(&shelf_image(320, 240));
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect/item-count", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "Complete");
    let results = json["results"].as_object().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results["ItemCount"]["count"], 2);
}

#[tokio::test]
async fn test_inspect_unknown_kind_is_404() {
    let png = encode_png(&shelf_image(64, 64));
    let response = app(full_snapshot())
        .oneshot(upload("/v1/inspect/barcode", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preprocess_stage_returns_png() {
    let png = encode_png(&shelf_image(320, 240));
    let response = app(DetectorSnapshot::default())
        .oneshot(upload("/v1/preprocess/edges", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let regions: usize = response.headers()[REGION_COUNT_HEADER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(regions > 0);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1024, 768));
}

#[tokio::test]
async fn test_preprocess_unknown_stage_is_404() {
    let png = encode_png(&shelf_image(64, 64));
    let response = app(DetectorSnapshot::default())
        .oneshot(upload("/v1/preprocess/sharpen", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let service = {
        let mut config = test_config(1000);
        config.max_image_bytes = 1024;
        let registry = Arc::new(fabstir_inspection_node::detectors::DetectorRegistry::new(
            DetectorSnapshot::default(),
        ));
        fabstir_inspection_node::inspection::InspectionService::new(&config, registry).unwrap()
    };
    let app = create_router(AppState {
        service: Arc::new(service),
    });

    // over the per-image limit but inside the multipart headroom
    let png = encode_png(&noise_image(40, 40));
    assert!(png.len() > 1024 && png.len() < 64 * 1024);
    let response = app
        .oneshot(upload("/v1/inspect", Some("image/png"), &png))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
