// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Logs command - print container logs in plan order

use miette::Result;

use super::Common;

/// Run the logs command
pub async fn run(common: &Common, follow: bool) -> Result<()> {
    let pipeline = super::load_pipeline(common)?;
    pipeline.logs(follow).await?;
    Ok(())
}
