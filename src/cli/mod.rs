// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for derrick.

pub mod build;
pub mod kill;
pub mod logs;
pub mod network;
pub mod preprocessor;
pub mod pull;
pub mod rm;
pub mod up;

use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::pipeline::{loader, Pipeline};

/// Default environment overlay, picked up from the definition's
/// directory when present.
const DEFAULT_ENVIRONMENT_FILE: &str = "derrick.env.yml";

/// Container pipeline orchestrator
///
/// Drive a DAG of containerized workloads to completion.
#[derive(Parser, Debug)]
#[clap(
    name = "derrick",
    version,
    about = "Container pipeline orchestrator",
    long_about = None,
    after_help = "Examples:\n\
        derrick pull                    Pull the pipeline's images\n\
        derrick up                      Bring the pipeline up\n\
        derrick logs --follow           Follow container output\n\
        derrick preprocessor statements List preprocessor directives\n\n\
        See 'derrick <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Pipeline definition file
    #[clap(short = 'f', long = "file", global = true, default_value = "derrick.yml", value_name = "FILE")]
    pub file: PathBuf,

    /// Environment overlay file
    #[clap(long, global = true, value_name = "FILE")]
    pub env: Option<PathBuf>,

    /// Run only the named step and its dependencies (repeatable)
    #[clap(long, global = true, value_name = "NAME")]
    pub select: Vec<String>,

    /// Drop the named step from the pipeline (repeatable)
    #[clap(long, global = true, value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the images of steps with a build context
    Build {
        /// Rebuild even when the image already exists
        #[clap(long)]
        force: bool,
    },

    /// Pull the images of steps with an image reference
    Pull {
        /// Pull even when the image already exists
        #[clap(long)]
        force: bool,
    },

    /// Execute the pipeline
    Up {
        /// Leave temp-directory contents in place after the run
        #[clap(long)]
        no_temp_dir_cleanup: bool,
    },

    /// Print container logs in plan order
    Logs {
        /// Keep following the log streams
        #[clap(short = 'F', long)]
        follow: bool,
    },

    /// Kill and remove the pipeline's containers
    Kill,

    /// Remove the pipeline's containers
    Rm,

    /// Manage the pipeline network
    Network {
        #[clap(subcommand)]
        action: NetworkAction,
    },

    /// Preprocessor utilities
    Preprocessor {
        #[clap(subcommand)]
        action: PreprocessorAction,
    },
}

/// Network lifecycle actions
#[derive(Subcommand, Debug, Clone)]
pub enum NetworkAction {
    /// Create the pipeline network
    Create,

    /// Remove the pipeline network
    Remove,
}

/// Preprocessor actions
#[derive(Subcommand, Debug, Clone)]
pub enum PreprocessorAction {
    /// List the available preprocessor statements
    Statements,
}

/// Global options shared by the pipeline verbs.
#[derive(Debug, Clone)]
pub struct Common {
    pub file: PathBuf,
    pub env: Option<PathBuf>,
    pub select: Vec<String>,
    pub ignore: Vec<String>,
    pub verbose: bool,
}

impl Cli {
    /// Collect the global options.
    pub fn common(&self) -> Common {
        Common {
            file: self.file.clone(),
            env: self.env.clone(),
            select: self.select.clone(),
            ignore: self.ignore.clone(),
            verbose: self.verbose,
        }
    }
}

/// Load the pipeline addressed by the global options.
pub(crate) fn load_pipeline(common: &Common) -> miette::Result<Pipeline> {
    if !common.file.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            common.file.display()
        ));
    }

    let environment = match &common.env {
        Some(path) => Some(path.clone()),
        None => {
            let sibling = common
                .file
                .parent()
                .unwrap_or(std::path::Path::new("."))
                .join(DEFAULT_ENVIRONMENT_FILE);
            sibling.exists().then_some(sibling)
        }
    };

    let selected: BTreeSet<String> = common.select.iter().cloned().collect();
    let ignored: BTreeSet<String> = common.ignore.iter().cloned().collect();

    let pipeline = loader::load(
        &common.file,
        environment.as_deref(),
        std::env::vars().collect(),
        selected,
        ignored,
    )?;
    Ok(pipeline)
}
