// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! # derrick - Container Pipeline Orchestrator
//!
//! `derrick` drives a DAG of containerized workloads, described in a
//! compose-superset document, to completion against a local container
//! runtime.
//!
//! ## Features
//!
//! - **Two-file merge** - a definition document plus an environment
//!   overlay that can disable, substitute, or amend steps
//! - **Text preprocessor** - `#!` directives for conditional blocks,
//!   variable binding, and temp-directory allocation
//! - **Layered execution** - independent steps run concurrently, with
//!   a strict barrier between dependency layers
//! - **Dual-runner dispatch** - per-step policy routes work to the
//!   live runtime or a counting no-op runner
//!
//! ## Quick Start
//!
//! ```bash
//! # Pull the pipeline's images
//! derrick pull
//!
//! # Bring the pipeline up
//! derrick up
//!
//! # Follow a finished run's output
//! derrick logs --follow
//! ```

pub mod cli;
pub mod errors;
pub mod pipeline;
pub mod preprocessor;
pub mod runner;

// Re-export commonly used types
pub use errors::{DerrickError, DerrickResult};
pub use pipeline::{ExecutionPlan, Pipeline, PipelineDefinition, Step};
pub use preprocessor::{Preprocessor, TempDirectory};
pub use runner::{DockerRunner, Network, NoopRunner, Runner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
