// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use fabstir_inspection_node::{
    api::start_server,
    config::InspectionConfig,
    detectors::{load_snapshot, DetectorRegistry},
    inspection::InspectionService,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Fabstir Inspection Node...\n");
    println!("📦 BUILD VERSION: {}", fabstir_inspection_node::version::VERSION);
    println!("📅 Build Date: {}", fabstir_inspection_node::version::BUILD_DATE);
    println!();

    // Configuration: TOML file when INSPECT_CONFIG is set, environment otherwise
    let config = match env::var("INSPECT_CONFIG") {
        Ok(path) => {
            println!("📄 Loading configuration from {}", path);
            InspectionConfig::from_file(&path)?
        }
        Err(_) => InspectionConfig::from_env(),
    };
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    println!("🔍 Loading detectors...");
    let snapshot = load_snapshot(&config.models).await;
    let missing = snapshot.missing_kinds();
    println!("✅ {} detector(s) registered", snapshot.len());
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
        println!("⚠️  Not configured: {}", names.join(", "));
    }

    let registry = Arc::new(DetectorRegistry::new(snapshot));
    let service = Arc::new(InspectionService::new(&config, registry)?);

    println!(
        "⏱️  Detector timeout: {}ms, max image: {} bytes",
        config.detector_timeout_ms, config.max_image_bytes
    );
    println!("🌐 Starting API server on {}...", config.listen_addr);

    start_server(service, &config.listen_addr)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))?;

    Ok(())
}
