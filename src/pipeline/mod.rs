// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Pipeline model and execution
//!
//! The definition schema and merge rules, the format version check,
//! the layered dependency graph, the two-file loader, and the
//! execution engine.

mod definition;
mod engine;
mod graph;
pub mod loader;
mod version;

pub use definition::*;
pub use engine::Pipeline;
pub use graph::{ExecutionPlan, GraphBuilder};
pub use version::{COMPOSE_FORMAT_MAJOR_MIN, COMPOSE_FORMAT_MINOR_MIN};
