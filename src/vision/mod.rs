// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image handling for product inspection
//!
//! This module provides:
//! - Upload ingestion (JPEG / PNG to canonical RGB)
//! - The deterministic preprocessing chain that yields candidate regions
//!
//! Both run on CPU and are free of I/O.

pub mod ingest;
pub mod preprocessing;

pub use ingest::{
    detect_format, normalize_mime_type, CanonicalImage, ImageIngestor, IngestError, RawImage,
    ACCEPTED_MIME_TYPES, DEFAULT_MAX_IMAGE_BYTES,
};
pub use preprocessing::{
    ArtifactBuffer, BoundingBox, PipelineArtifact, PipelineConfig, PipelineOutput,
    PreprocessingPipeline, Region, Stage, StageParams,
};
