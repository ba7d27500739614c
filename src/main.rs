// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! derrick - Container Pipeline Orchestrator
//!
//! Drive a DAG of containerized workloads to completion.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use derrick::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; --verbose raises the default level.
    let default_filter = if cli.verbose { "derrick=debug" } else { "derrick=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let common = cli.common();

    // Dispatch to command handlers
    match cli.command {
        Commands::Build { force } => derrick::cli::build::run(&common, force).await,
        Commands::Pull { force } => derrick::cli::pull::run(&common, force).await,
        Commands::Up { no_temp_dir_cleanup } => {
            derrick::cli::up::run(&common, no_temp_dir_cleanup).await
        }
        Commands::Logs { follow } => derrick::cli::logs::run(&common, follow).await,
        Commands::Kill => derrick::cli::kill::run(&common).await,
        Commands::Rm => derrick::cli::rm::run(&common).await,
        Commands::Network { action } => derrick::cli::network::run(&common, action).await,
        Commands::Preprocessor { action } => derrick::cli::preprocessor::run(action).await,
    }
}
