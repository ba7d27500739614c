// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Compose file format version check
//!
//! Versions are `MAJOR[.MINOR]` with decimal non-negative components;
//! a missing minor defaults to 0 and a missing version normalizes to
//! `1.0` for reporting. Comparison is lexicographic over
//! `(major, minor)`.

use crate::errors::{DerrickError, DerrickResult};
use crate::pipeline::PipelineDefinition;

/// Minimum supported compose format major version
pub const COMPOSE_FORMAT_MAJOR_MIN: u32 = 2;

/// Minimum supported compose format minor version
pub const COMPOSE_FORMAT_MINOR_MIN: u32 = 0;

impl PipelineDefinition {
    /// Check the document's format version against the supported
    /// minimum.
    pub fn check_version(&self) -> DerrickResult<()> {
        let (major, minor) = parse_version(&self.version)?;
        if (major, minor) < (COMPOSE_FORMAT_MAJOR_MIN, COMPOSE_FORMAT_MINOR_MIN) {
            return Err(DerrickError::UnsupportedVersion {
                got: format!("{major}.{minor}"),
                want: format!("{COMPOSE_FORMAT_MAJOR_MIN}.{COMPOSE_FORMAT_MINOR_MIN}"),
            });
        }
        Ok(())
    }
}

fn parse_version(raw: &str) -> DerrickResult<(u32, u32)> {
    if raw.trim().is_empty() {
        return Ok((1, 0));
    }
    let invalid = || DerrickError::InvalidVersion(raw.to_string());
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() > 2 {
        return Err(invalid());
    }
    let major = parts[0].parse::<u32>().map_err(|_| invalid())?;
    let minor = match parts.get(1) {
        Some(part) => part.parse::<u32>().map_err(|_| invalid())?,
        None => 0,
    };
    Ok((major, minor))
}
