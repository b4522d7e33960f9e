// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Fabstir Inspection CLI
#[derive(Parser, Debug)]
#[command(name = "inspect-cli")]
#[command(version = "1.0.0")]
#[command(about = "Offline tools for the Fabstir inspection pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the preprocessing chain and dump every stage as PNG
    Preprocess(commands::PreprocessArgs),

    /// Run detectors against an image and print the JSON report
    Inspect(commands::InspectArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Preprocess(args) => commands::preprocess(args).await,
        Commands::Inspect(args) => commands::inspect(args).await,
    }
}
