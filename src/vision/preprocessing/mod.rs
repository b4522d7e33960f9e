// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic preprocessing chain
//!
//! Every uploaded image goes through the same ordered stages:
//! original -> resized -> grayscale -> blurred -> edges -> morphological -> contours
//!
//! Each stage is a pure function of the previous artifact (the contour overlay
//! also reads the resized image). All artifacts are kept so they can be
//! inspected by stage name; the contour stage additionally yields the
//! candidate regions handed to the detectors.

pub mod contours;
pub mod edges;
pub mod filters;

pub use contours::{BoundingBox, Region};

use crate::vision::ingest::CanonicalImage;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Pipeline stage identifiers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Original,
    Resized,
    Grayscale,
    Blurred,
    Edges,
    Morphological,
    Contours,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Original,
        Stage::Resized,
        Stage::Grayscale,
        Stage::Blurred,
        Stage::Edges,
        Stage::Morphological,
        Stage::Contours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Original => "original",
            Stage::Resized => "resized",
            Stage::Grayscale => "grayscale",
            Stage::Blurred => "blurred",
            Stage::Edges => "edges",
            Stage::Morphological => "morphological",
            Stage::Contours => "contours",
        }
    }

    /// 1-based position in the chain
    pub fn step(&self) -> usize {
        *self as usize + 1
    }

    /// File name used when dumping artifacts, e.g. `step5_edges.png`
    pub fn file_name(&self) -> String {
        format!("step{}_{}.png", self.step(), self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == lower)
            .ok_or_else(|| format!("Unknown pipeline stage: {}", s))
    }
}

/// Tunables for the preprocessing chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target width of the resized stage
    pub target_width: u32,
    /// Target height of the resized stage
    pub target_height: u32,
    /// Blur kernel size (odd)
    pub blur_kernel_size: u32,
    /// Canny hysteresis low threshold
    pub canny_low: f32,
    /// Canny hysteresis high threshold
    pub canny_high: f32,
    /// Side of the square structuring element (odd)
    pub morph_kernel_size: u32,
    /// Closing passes
    pub close_iterations: u32,
    /// Dilation passes after closing
    pub dilate_iterations: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_width: 1024,
            target_height: 768,
            blur_kernel_size: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            morph_kernel_size: 3,
            close_iterations: 2,
            dilate_iterations: 2,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err("Target dimensions must be greater than 0".to_string());
        }
        if self.blur_kernel_size < 3
            || self.blur_kernel_size % 2 == 0
            || self.blur_kernel_size > filters::MAX_BLUR_KERNEL_SIZE
        {
            return Err(format!(
                "Blur kernel size must be odd and within 3..={}, got {}",
                filters::MAX_BLUR_KERNEL_SIZE,
                self.blur_kernel_size
            ));
        }
        if !(self.canny_low > 0.0 && self.canny_low <= self.canny_high) {
            return Err(format!(
                "Canny thresholds must satisfy 0 < low <= high, got {} / {}",
                self.canny_low, self.canny_high
            ));
        }
        if self.morph_kernel_size == 0 || self.morph_kernel_size % 2 == 0 {
            return Err(format!(
                "Morphology kernel size must be odd, got {}",
                self.morph_kernel_size
            ));
        }
        let radius = self.morph_kernel_size / 2;
        let max_iterations = self.close_iterations.max(self.dilate_iterations);
        match radius.checked_mul(max_iterations) {
            Some(r) if r <= u8::MAX as u32 => {}
            _ => return Err("Morphology radius is too large".to_string()),
        }
        Ok(())
    }
}

/// Parameters a stage ran with, recorded alongside its output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageParams {
    Original { width: u32, height: u32 },
    Resized { width: u32, height: u32 },
    Grayscale,
    Blurred { kernel_size: u32 },
    Edges { low: f32, high: f32 },
    Morphological {
        kernel_size: u32,
        close_iterations: u32,
        dilate_iterations: u32,
    },
    Contours { region_count: usize },
}

/// Pixel data of an artifact
#[derive(Debug, Clone)]
pub enum ArtifactBuffer {
    Rgb(Arc<RgbImage>),
    Luma(Arc<GrayImage>),
}

impl ArtifactBuffer {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ArtifactBuffer::Rgb(img) => img.dimensions(),
            ArtifactBuffer::Luma(img) => img.dimensions(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            ArtifactBuffer::Rgb(_) => 3,
            ArtifactBuffer::Luma(_) => 1,
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        match self {
            ArtifactBuffer::Rgb(img) => img.as_raw(),
            ArtifactBuffer::Luma(img) => img.as_raw(),
        }
    }

    fn to_dynamic(&self) -> DynamicImage {
        match self {
            ArtifactBuffer::Rgb(img) => DynamicImage::ImageRgb8(img.as_ref().clone()),
            ArtifactBuffer::Luma(img) => DynamicImage::ImageLuma8(img.as_ref().clone()),
        }
    }

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Cursor::new(Vec::new());
        self.to_dynamic().write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

/// One named stage output
#[derive(Debug, Clone)]
pub struct PipelineArtifact {
    pub stage: Stage,
    pub params: StageParams,
    pub buffer: ArtifactBuffer,
}

/// Everything the chain produced for one image
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One artifact per stage, in [`Stage::ALL`] order
    pub artifacts: Vec<PipelineArtifact>,
    pub regions: Vec<Region>,
}

impl PipelineOutput {
    pub fn artifact(&self, stage: Stage) -> Option<&PipelineArtifact> {
        self.artifacts.iter().find(|a| a.stage == stage)
    }

    /// The resized image, the coordinate space of every region
    pub fn resized(&self) -> Option<CanonicalImage> {
        match self.artifact(Stage::Resized).map(|a| &a.buffer) {
            Some(ArtifactBuffer::Rgb(img)) => Some(CanonicalImage::from_shared(Arc::clone(img))),
            _ => None,
        }
    }
}

/// Runs the fixed stage chain
#[derive(Debug, Clone, Default)]
pub struct PreprocessingPipeline {
    config: PipelineConfig,
}

impl PreprocessingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `image`.
    ///
    /// Never fails: an image without contours simply yields no regions.
    pub fn run(&self, image: &CanonicalImage) -> PipelineOutput {
        let cfg = &self.config;
        let started = Instant::now();
        let mut artifacts = Vec::with_capacity(Stage::ALL.len());

        let original = image.shared_pixels();
        artifacts.push(PipelineArtifact {
            stage: Stage::Original,
            params: StageParams::Original {
                width: original.width(),
                height: original.height(),
            },
            buffer: ArtifactBuffer::Rgb(Arc::clone(&original)),
        });

        let resized = Arc::new(filters::resize(&original, cfg.target_width, cfg.target_height));
        artifacts.push(PipelineArtifact {
            stage: Stage::Resized,
            params: StageParams::Resized {
                width: cfg.target_width,
                height: cfg.target_height,
            },
            buffer: ArtifactBuffer::Rgb(Arc::clone(&resized)),
        });

        let gray = filters::grayscale(&resized);
        let blurred = filters::binomial_blur(&gray, cfg.blur_kernel_size);
        let edges = edges::canny(&blurred, cfg.canny_low, cfg.canny_high);
        let morph = filters::close_then_dilate(
            &edges,
            cfg.morph_kernel_size,
            cfg.close_iterations,
            cfg.dilate_iterations,
        );
        let regions = contours::extract_regions(&morph);
        let overlay = contours::draw_regions(&resized, &regions);

        artifacts.push(PipelineArtifact {
            stage: Stage::Grayscale,
            params: StageParams::Grayscale,
            buffer: ArtifactBuffer::Luma(Arc::new(gray)),
        });
        artifacts.push(PipelineArtifact {
            stage: Stage::Blurred,
            params: StageParams::Blurred {
                kernel_size: cfg.blur_kernel_size,
            },
            buffer: ArtifactBuffer::Luma(Arc::new(blurred)),
        });
        artifacts.push(PipelineArtifact {
            stage: Stage::Edges,
            params: StageParams::Edges {
                low: cfg.canny_low,
                high: cfg.canny_high,
            },
            buffer: ArtifactBuffer::Luma(Arc::new(edges)),
        });
        artifacts.push(PipelineArtifact {
            stage: Stage::Morphological,
            params: StageParams::Morphological {
                kernel_size: cfg.morph_kernel_size,
                close_iterations: cfg.close_iterations,
                dilate_iterations: cfg.dilate_iterations,
            },
            buffer: ArtifactBuffer::Luma(Arc::new(morph)),
        });
        artifacts.push(PipelineArtifact {
            stage: Stage::Contours,
            params: StageParams::Contours {
                region_count: regions.len(),
            },
            buffer: ArtifactBuffer::Rgb(Arc::new(overlay)),
        });

        debug!(
            width = image.width(),
            height = image.height(),
            regions = regions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Preprocessing complete"
        );

        PipelineOutput { artifacts, regions }
    }
}
