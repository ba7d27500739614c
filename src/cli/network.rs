// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Network command - manage the pipeline network

use colored::Colorize;
use miette::Result;

use super::{Common, NetworkAction};

/// Run the network command
pub async fn run(common: &Common, action: NetworkAction) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;

    match action {
        NetworkAction::Create => {
            pipeline.create_network().await?;
            println!("{} network '{}'", "Created".green(), pipeline.network);
        }
        NetworkAction::Remove => {
            pipeline.remove_network().await?;
            println!("{} network '{}'", "Removed".green(), pipeline.network);
        }
    }
    Ok(())
}
