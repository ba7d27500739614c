// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Error types
//!
//! One crate-wide error enum covering the parse, schema, graph,
//! preprocessor, runner, and cancellation classes.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for derrick operations
pub type DerrickResult<T> = Result<T, DerrickError>;

/// Main error type for derrick
#[derive(Error, Debug, Diagnostic)]
pub enum DerrickError {
    // ─────────────────────────────────────────────────────────────────────────
    // Parse Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("malformed preprocessor directive: {directive}")]
    #[diagnostic(
        code(derrick::malformed_directive),
        help("Directives have the form '#! FUNCTION [args...]'; run 'derrick preprocessor statements' for the available functions")
    )]
    MalformedDirective { directive: String },

    #[error("invalid compose file format version: {0}")]
    #[diagnostic(code(derrick::invalid_version))]
    InvalidVersion(String),

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(derrick::yaml_error))]
    Yaml { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Schema Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("not supported compose file format version: got: {got} want >= {want}")]
    #[diagnostic(code(derrick::unsupported_version))]
    UnsupportedVersion { got: String, want: String },

    #[error("no image or build context for step '{step}'")]
    #[diagnostic(
        code(derrick::missing_container_information),
        help("Declare exactly one of 'image' or 'build' on the step")
    )]
    MissingContainerInformation { step: String },

    #[error("step '{name}' is defined as both a step and a service")]
    #[diagnostic(code(derrick::duplicate_step_name))]
    DuplicateStepName { name: String },

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(derrick::unknown_dependency),
        help("Check that '{dependency}' is defined in the pipeline")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("step '{step}' not found in pipeline")]
    #[diagnostic(code(derrick::step_not_found))]
    StepNotFound { step: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("dependency cycle detected involving: {}", .steps.join(", "))]
    #[diagnostic(
        code(derrick::cycle),
        help("Review the 'after' and 'depends_on' relations of the listed steps")
    )]
    Cycle { steps: Vec<String> },

    #[error("step '{step}' depends on itself")]
    #[diagnostic(code(derrick::self_dependency))]
    SelfDependency { step: String },

    #[error("selected step '{name}' does not exist in the pipeline")]
    #[diagnostic(code(derrick::unknown_selection))]
    UnknownSelection { name: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Preprocessor Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("unbalanced conditional")]
    #[diagnostic(
        code(derrick::unbalanced_conditional),
        help("Every IF/IF_NOT needs exactly one matching END_IF")
    )]
    UnbalancedConditional,

    #[error("unresolved variable '${{{name}}}'")]
    #[diagnostic(
        code(derrick::unresolved_variable),
        help("Define '{name}' in the process environment or with '#! SET {name} <value>'")
    )]
    UnresolvedVariable { name: String },

    #[error("unknown preprocessor directive '{name}'")]
    #[diagnostic(
        code(derrick::unknown_directive),
        help("Run 'derrick preprocessor statements' for the available functions")
    )]
    UnknownDirective { name: String },

    #[error("unknown predicate '{name}'")]
    #[diagnostic(
        code(derrick::unknown_predicate),
        help("Available predicates: DEFINED, EMPTY, EQUALS, EXISTS")
    )]
    UnknownPredicate { name: String },

    #[error("failed to allocate temporary directory: {message}")]
    #[diagnostic(code(derrick::temp_dir_allocation))]
    TempDirAllocation { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Runner Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("runner verb {key} failed: {message}")]
    #[diagnostic(code(derrick::runner))]
    Runner { key: String, message: String },

    #[error("execution failed: {message}")]
    #[diagnostic(code(derrick::execution_failed))]
    Execution { message: String },

    #[error("cancelled")]
    #[diagnostic(code(derrick::cancelled))]
    Cancelled,

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("failed to read file '{path}': {error}")]
    #[diagnostic(code(derrick::file_read_error))]
    FileRead { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(derrick::io_error))]
    Io { message: String },
}

impl From<std::io::Error> for DerrickError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for DerrickError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl DerrickError {
    /// Cooperative cancellation is not a failure of the step itself and
    /// is suppressed when surfacing layer results.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create a runner error for the given instrumentation key.
    pub fn runner(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runner {
            key: key.into(),
            message: message.into(),
        }
    }
}
