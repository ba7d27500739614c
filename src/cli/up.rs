// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Up command - execute the pipeline

use colored::Colorize;
use miette::Result;

use super::Common;

/// Run the up command
pub async fn run(common: &Common, no_temp_dir_cleanup: bool) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;
    pipeline.check()?;

    print_plan(&pipeline);

    pipeline.create_network().await?;
    // Pre-run sweep: stale containers go, keep-alive containers stay.
    pipeline.kill_containers(true).await?;

    let result = pipeline.execute_steps().await;

    if !no_temp_dir_cleanup && !pipeline.temp_dirs().is_empty() {
        println!("{}", "Clearing temp directories...".dimmed());
        if let Err(err) = pipeline.remove_temp_dir_data().await {
            if result.is_ok() {
                return Err(err.into());
            }
            // The execution error is the one worth surfacing.
            tracing::warn!(%err, "temp directory cleanup failed");
        }
    }

    result?;
    println!();
    println!("{}", "Pipeline completed successfully.".green().bold());
    Ok(())
}

fn print_plan(pipeline: &crate::pipeline::Pipeline) {
    println!();
    println!("{}: {}", "Pipeline".bold(), pipeline.network);
    println!("{}", "═".repeat(50));
    let layers = pipeline.plan().layers();
    println!(
        "Execution plan ({} layer{}):",
        layers.len(),
        if layers.len() == 1 { "" } else { "s" }
    );
    println!();
    for (i, layer) in layers.iter().enumerate() {
        println!("  {}. {}", i + 1, layer.join(", ").bold());
    }
    println!();
}
