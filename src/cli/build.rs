// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Build command - build images for steps with a build context

use colored::Colorize;
use miette::Result;

use super::Common;

/// Run the build command
pub async fn run(common: &Common, force: bool) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;

    let buildable = pipeline
        .definition
        .all_steps()
        .filter(|(_, step)| step.build.is_some())
        .count();
    if buildable == 0 {
        println!("{}", "No steps declare a build context.".dimmed());
        return Ok(());
    }

    println!(
        "{} {} image{}...",
        "Building".bold(),
        buildable,
        if buildable == 1 { "" } else { "s" }
    );
    pipeline.build_images(force).await?;
    println!("{}", "Images built.".green());
    Ok(())
}
