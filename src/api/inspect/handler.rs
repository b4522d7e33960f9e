// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inspection endpoint handlers

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::Multipart;
use tracing::{debug, warn};

use super::upload::read_upload;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::detectors::DetectorKind;
use crate::inspection::{InspectionResponse, ReportBuilder};
use crate::vision::Stage;

/// Response header carrying the number of contour regions found
pub const REGION_COUNT_HEADER: &str = "x-region-count";

/// POST /v1/inspect - Run every detector against an uploaded image
///
/// # Request
/// multipart/form-data with a `file` part (image/jpeg or image/png)
///
/// # Response
/// `status` (complete / partial / failed) plus one entry per detector kind.
/// A detector that failed or is not configured appears with `error` and
/// `errorKind` instead of its result.
///
/// # Errors
/// - 415 Unsupported Media Type: declared type is not JPEG or PNG
/// - 400 Bad Request: empty or undecodable image, malformed multipart body
/// - 413 Payload Too Large: image exceeds the configured limit
pub async fn inspect_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<InspectionResponse>, ApiError> {
    let raw = read_upload(multipart).await?;

    let report = state.service.inspect(raw).await.map_err(|e| {
        warn!("Inspection rejected: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(ReportBuilder::render(&report)))
}

/// POST /v1/inspect/:kind - Run a single detector
///
/// `kind` is either the variant name (`ItemCount`) or its slug (`item-count`).
pub async fn inspect_kind_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<Json<InspectionResponse>, ApiError> {
    let kind: DetectorKind = kind.parse().map_err(ApiError::NotFound)?;
    debug!("Single-detector inspection requested: {}", kind);

    let raw = read_upload(multipart).await?;

    let report = state
        .service
        .inspect_kinds(raw, &[kind])
        .await
        .map_err(|e| {
            warn!("Inspection rejected: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ReportBuilder::render(&report)))
}

/// POST /v1/preprocess/:stage - Return one intermediate artifact as PNG
///
/// The `x-region-count` header carries the number of regions the full chain
/// extracted, whichever stage is requested.
pub async fn preprocess_stage_handler(
    State(state): State<AppState>,
    Path(stage): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let stage: Stage = stage.parse().map_err(ApiError::NotFound)?;

    let raw = read_upload(multipart).await?;
    let output = state.service.preprocess(raw).await.map_err(ApiError::from)?;

    let artifact = output
        .artifact(stage)
        .ok_or_else(|| ApiError::InternalError(format!("stage {} produced no artifact", stage)))?;

    let png = artifact
        .buffer
        .to_png()
        .map_err(|e| ApiError::InternalError(format!("PNG encoding failed: {}", e)))?;

    debug!(
        "Stage {} rendered: {} bytes, {} regions",
        stage,
        png.len(),
        output.regions.len()
    );

    let region_count = HeaderValue::from(output.regions.len());
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (HeaderName::from_static(REGION_COUNT_HEADER), region_count),
        ],
        png,
    )
        .into_response())
}
