// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Pipeline loader
//!
//! Produces a [`Pipeline`] from a definition document and an optional
//! environment overlay: preprocess both, parse, merge, normalize,
//! validate, build the execution plan, and union the temp-directory
//! registries.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::errors::{DerrickError, DerrickResult};
use crate::pipeline::{GraphBuilder, Pipeline, PipelineDefinition};
use crate::preprocessor::Preprocessor;
use crate::runner::Network;

/// Load a pipeline from document files.
///
/// `ambient` is the process environment the `${VAR}` references and
/// `SET` precedence resolve against; `selected` and `ignored` shape
/// the execution plan.
pub fn load(
    definition_path: &Path,
    environment_path: Option<&Path>,
    ambient: HashMap<String, String>,
    selected: BTreeSet<String>,
    ignored: BTreeSet<String>,
) -> DerrickResult<Pipeline> {
    let definition_text = read(definition_path)?;
    let environment_text = environment_path.map(read).transpose()?;
    let base_dir = definition_path.parent().unwrap_or(Path::new("."));

    let mut pipeline = from_sources(
        &definition_text,
        environment_text.as_deref(),
        base_dir,
        ambient,
        selected,
        ignored,
    )?;
    pipeline.network = default_network(definition_path);
    Ok(pipeline)
}

/// Load a pipeline from in-memory document text.
///
/// The resulting pipeline has an empty [`Network`]; callers that need
/// one set it explicitly.
pub fn from_sources(
    definition: &str,
    environment: Option<&str>,
    base_dir: &Path,
    ambient: HashMap<String, String>,
    selected: BTreeSet<String>,
    ignored: BTreeSet<String>,
) -> DerrickResult<Pipeline> {
    let preprocessor = Preprocessor::new();

    // One preprocessor state per document; temp-directory registries
    // are unioned afterwards.
    let preprocessed_definition =
        preprocessor.process(definition, ambient.clone(), base_dir)?;
    let preprocessed_environment = environment
        .map(|text| preprocessor.process(text, ambient.clone(), base_dir))
        .transpose()?;

    let base = PipelineDefinition::from_yaml(&preprocessed_definition.text)?;
    let overlay = preprocessed_environment
        .as_ref()
        .map(|p| PipelineDefinition::from_yaml(&p.text))
        .transpose()?
        .unwrap_or_default();

    let mut merged = base.merged_with(&overlay);
    merged.normalize();
    merged.check_version()?;
    merged.validate()?;

    let plan = GraphBuilder::build(&merged, &selected, &ignored)?.plan()?;

    let mut temp_dirs = preprocessed_definition.temp_dirs;
    if let Some(preprocessed) = preprocessed_environment {
        temp_dirs.extend(preprocessed.temp_dirs);
    }

    Ok(Pipeline::new(merged, plan, temp_dirs))
}

fn read(path: &Path) -> DerrickResult<String> {
    std::fs::read_to_string(path).map_err(|e| DerrickError::FileRead {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Derive the pipeline network name from the definition file stem.
fn default_network(definition_path: &Path) -> Network {
    let stem = definition_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "derrick".to_string());
    Network(format!("{stem}_net"))
}
