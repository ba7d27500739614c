// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Rm command - remove the pipeline's containers

use colored::Colorize;
use miette::Result;

use super::Common;

/// Run the rm command
pub async fn run(common: &Common) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;

    pipeline.remove_containers(false).await?;
    println!("{}", "Containers removed.".green());
    Ok(())
}
