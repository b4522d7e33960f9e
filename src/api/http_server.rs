// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::inspect::{inspect_handler, inspect_kind_handler, preprocess_stage_handler};
use crate::detectors::{DetectorKind, DetectorStatus};
use crate::inspection::InspectionService;

/// Headroom on top of the image limit for multipart framing
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InspectionService>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: serde_json::Value,
    pub registered_detectors: usize,
    pub missing_detectors: Vec<DetectorKind>,
}

#[derive(Debug, Serialize)]
pub struct DetectorsResponse {
    pub detectors: Vec<DetectorStatus>,
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .service
        .max_image_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        // Health and capability discovery
        .route("/health", get(health_handler))
        .route("/v1/detectors", get(detectors_handler))
        // Inspection
        .route("/v1/inspect", post(inspect_handler))
        .route("/v1/inspect/:kind", post(inspect_kind_handler))
        // Stage diagnostics
        .route("/v1/preprocess/:stage", post(preprocess_stage_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(
    service: Arc<InspectionService>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(AppState { service });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Inspection API listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.service.registry().snapshot().await;
    let missing = snapshot.missing_kinds();

    let status = if snapshot.is_empty() {
        "no_detectors"
    } else if missing.is_empty() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: crate::version::get_version_info(),
        registered_detectors: snapshot.len(),
        missing_detectors: missing,
    })
}

async fn detectors_handler(State(state): State<AppState>) -> Json<DetectorsResponse> {
    let snapshot = state.service.registry().snapshot().await;
    Json(DetectorsResponse {
        detectors: snapshot.describe(),
    })
}
