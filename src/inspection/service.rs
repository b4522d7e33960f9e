// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end inspection: ingest, preprocess, dispatch, aggregate

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::aggregator::{InspectionReport, ResultAggregator};
use super::scheduler::OrchestrationScheduler;
use crate::config::InspectionConfig;
use crate::detectors::{DetectionInput, DetectorKind, DetectorRegistry};
use crate::vision::{ImageIngestor, IngestError, PipelineOutput, PreprocessingPipeline, RawImage};

#[derive(Debug, Error)]
pub enum InspectionError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Request-level entry point shared by the HTTP layer and the CLI
pub struct InspectionService {
    ingestor: ImageIngestor,
    pipeline: PreprocessingPipeline,
    registry: Arc<DetectorRegistry>,
    scheduler: OrchestrationScheduler,
    aggregator: ResultAggregator,
}

impl InspectionService {
    pub fn new(config: &InspectionConfig, registry: Arc<DetectorRegistry>) -> Result<Self, InspectionError> {
        config.validate().map_err(InspectionError::Config)?;

        let aggregator = ResultAggregator::new(
            config.aggregation.item_count_confidence_floor,
            config.aggregation.pattern_version,
        )
        .map_err(|e| InspectionError::Config(e.to_string()))?;

        Ok(Self {
            ingestor: ImageIngestor::new(config.max_image_bytes),
            pipeline: PreprocessingPipeline::new(config.pipeline.clone()),
            registry,
            scheduler: OrchestrationScheduler::new(config.detector_timeout()),
            aggregator,
        })
    }

    pub fn registry(&self) -> &Arc<DetectorRegistry> {
        &self.registry
    }

    pub fn max_image_bytes(&self) -> usize {
        self.ingestor.max_image_bytes()
    }

    /// Decode and run the preprocessing chain on the blocking pool
    pub async fn preprocess(&self, raw: RawImage) -> Result<PipelineOutput, InspectionError> {
        let ingestor = self.ingestor.clone();
        let pipeline = self.pipeline.clone();

        tokio::task::spawn_blocking(move || -> Result<PipelineOutput, InspectionError> {
            let image = ingestor.ingest(raw)?;
            Ok(pipeline.run(&image))
        })
        .await
        .map_err(|e| InspectionError::Preprocessing(e.to_string()))?
    }

    /// Full inspection across every detector kind
    pub async fn inspect(&self, raw: RawImage) -> Result<InspectionReport, InspectionError> {
        self.run(raw, None).await
    }

    /// Inspection restricted to `kinds`
    pub async fn inspect_kinds(
        &self,
        raw: RawImage,
        kinds: &[DetectorKind],
    ) -> Result<InspectionReport, InspectionError> {
        self.run(raw, Some(kinds)).await
    }

    async fn run(
        &self,
        raw: RawImage,
        kinds: Option<&[DetectorKind]>,
    ) -> Result<InspectionReport, InspectionError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        let output = self.preprocess(raw).await?;
        let image = output
            .resized()
            .ok_or_else(|| InspectionError::Preprocessing("resized artifact missing".to_string()))?;
        let region_count = output.regions.len();
        let input = DetectionInput::new(image, output.regions);

        // held for the whole request, a concurrent swap does not affect it
        let snapshot = self.registry.snapshot().await;

        let report = match kinds {
            Some(kinds) => {
                let outcomes = self.scheduler.dispatch_kinds(&input, &snapshot, kinds).await;
                self.aggregator.aggregate_for(kinds, outcomes)
            }
            None => {
                let outcomes = self.scheduler.dispatch(&input, &snapshot).await;
                self.aggregator.aggregate(outcomes)
            }
        };

        info!(
            request_id = %request_id,
            status = ?report.status,
            regions = region_count,
            succeeded = report.succeeded(),
            requested = report.results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inspection complete"
        );

        Ok(report)
    }
}
