// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::InspectionConfig;
use crate::detectors::{load_snapshot, DetectorKind, DetectorRegistry};
use crate::inspection::{InspectionService, ReportBuilder};
use crate::vision::{detect_format, RawImage};

/// Arguments for the preprocess command
#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// Image to process (JPEG or PNG)
    #[arg(long)]
    pub input: PathBuf,

    /// Directory receiving one PNG per stage
    #[arg(long)]
    pub output_dir: PathBuf,

    /// TOML configuration file (can also be set via INSPECT_CONFIG env var)
    #[arg(long, env = "INSPECT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image to inspect (JPEG or PNG)
    #[arg(long)]
    pub input: PathBuf,

    /// TOML configuration file (can also be set via INSPECT_CONFIG env var)
    #[arg(long, env = "INSPECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated detector kinds, all kinds when omitted
    #[arg(long, value_delimiter = ',')]
    pub kinds: Vec<DetectorKind>,
}

/// Declared MIME type for a local file: extension first, then magic bytes
pub fn guess_mime_type(path: &Path, bytes: &[u8]) -> String {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match by_extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        Some("png") => "image/png".to_string(),
        _ => match detect_format(bytes) {
            Some(ImageFormat::Jpeg) => "image/jpeg".to_string(),
            Some(ImageFormat::Png) => "image/png".to_string(),
            _ => "application/octet-stream".to_string(),
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<InspectionConfig> {
    let config = match path {
        Some(path) => InspectionConfig::from_file(path)?,
        None => InspectionConfig::from_env(),
    };
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn read_image(path: &Path) -> Result<RawImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = guess_mime_type(path, &bytes);
    Ok(RawImage::new(bytes, mime))
}

async fn build_service(config: &InspectionConfig) -> Result<InspectionService> {
    let snapshot = load_snapshot(&config.models).await;
    let registry = Arc::new(DetectorRegistry::new(snapshot));
    Ok(InspectionService::new(config, registry)?)
}

/// Write every stage artifact and print the extracted regions
pub async fn preprocess(args: PreprocessArgs) -> Result<()> {
    // Preprocessing needs no detectors, skip model loading
    let mut config = load_config(args.config.as_deref())?;
    config.models = Default::default();
    let service = build_service(&config).await?;

    let raw = read_image(&args.input)?;
    let output = service.preprocess(raw).await?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    for artifact in &output.artifacts {
        let path = args.output_dir.join(artifact.stage.file_name());
        let png = artifact.buffer.to_png()?;
        std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    println!("{}", serde_json::to_string_pretty(&output.regions)?);
    println!("✅ {} regions, artifacts in {}", output.regions.len(), args.output_dir.display());
    Ok(())
}

/// Run detectors against a local image and print the report
pub async fn inspect(args: InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let service = build_service(&config).await?;

    let snapshot = service.registry().snapshot().await;
    if snapshot.is_empty() {
        warn!("⚠️  No detectors configured, every kind will report NotConfigured");
    }

    let raw = read_image(&args.input)?;
    let report = if args.kinds.is_empty() {
        service.inspect(raw).await?
    } else {
        service.inspect_kinds(raw, &args.kinds).await?
    };

    println!("{}", serde_json::to_string_pretty(&ReportBuilder::to_json(&report))?);
    Ok(())
}
