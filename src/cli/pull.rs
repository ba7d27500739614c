// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Pull command - pull images for steps with an image reference

use colored::Colorize;
use miette::Result;

use super::Common;

/// Run the pull command
pub async fn run(common: &Common, force: bool) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;

    println!("{}", "Pulling images...".bold());
    pipeline.pull_images(force).await?;
    println!("{}", "Images present.".green());
    Ok(())
}
