// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Kill command - kill and remove the pipeline's containers

use colored::Colorize;
use miette::Result;

use super::Common;

/// Run the kill command
pub async fn run(common: &Common) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;

    println!("{}", "Killing containers...".bold());
    pipeline.kill_containers(false).await?;
    println!("{}", "Containers killed and removed.".green());
    Ok(())
}
