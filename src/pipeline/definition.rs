// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Pipeline definition structures
//!
//! Defines the schema for pipeline documents: a compose-superset with
//! `steps` and `services` maps, per-node container fields, and a
//! `meta` policy block. Also implements the environment-overlay merge
//! rules.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{DerrickError, DerrickResult};

/// Pipeline definition parsed from a preprocessed document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Compose file format version
    #[serde(default)]
    pub version: String,

    /// Short-lived workloads
    #[serde(default, deserialize_with = "step_map")]
    pub steps: BTreeMap<String, Step>,

    /// Long-lived workloads
    #[serde(default, deserialize_with = "step_map")]
    pub services: BTreeMap<String, Step>,
}

/// Accept `name:` entries without a body as empty steps.
fn step_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Step>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Option<Step>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, step)| (name, step.unwrap_or_default()))
        .collect())
}

impl PipelineDefinition {
    /// Parse a definition from preprocessed YAML text.
    ///
    /// An empty document yields the empty definition; environment
    /// overlays are frequently empty.
    pub fn from_yaml(yaml: &str) -> DerrickResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Look up a step by name in either map.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.get(name).or_else(|| self.services.get(name))
    }

    /// All nodes, steps first, in name order within each map.
    pub fn all_steps(&self) -> impl Iterator<Item = (&String, &Step)> {
        self.steps.iter().chain(self.services.iter())
    }

    /// Apply an environment overlay onto this definition.
    ///
    /// Steps present in both documents are merged per attribute;
    /// overlay-only steps are added.
    pub fn merged_with(&self, overlay: &PipelineDefinition) -> PipelineDefinition {
        let version = if overlay.version.is_empty() {
            self.version.clone()
        } else {
            overlay.version.clone()
        };
        PipelineDefinition {
            version,
            steps: merge_step_map(&self.steps, &overlay.steps),
            services: merge_step_map(&self.services, &overlay.services),
        }
    }

    /// Stamp names and kinds and fold top-level flags into `Meta`.
    ///
    /// Called once after merging; `Meta` is canonical from then on.
    pub fn normalize(&mut self) {
        for (name, step) in &mut self.steps {
            step.normalize(name, StepKind::Step);
        }
        for (name, step) in &mut self.services {
            step.normalize(name, StepKind::Service);
        }
    }

    /// Validate cross-map name uniqueness and dependency references.
    pub fn validate(&self) -> DerrickResult<()> {
        for name in self.services.keys() {
            if self.steps.contains_key(name) {
                return Err(DerrickError::DuplicateStepName { name: name.clone() });
            }
        }
        for (name, step) in self.all_steps() {
            for dependency in step.dependencies() {
                if self.step(dependency).is_none() {
                    return Err(DerrickError::UnknownDependency {
                        step: name.clone(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn merge_step_map(
    base: &BTreeMap<String, Step>,
    overlay: &BTreeMap<String, Step>,
) -> BTreeMap<String, Step> {
    let mut merged = base.clone();
    for (name, overlay_step) in overlay {
        match merged.get(name) {
            Some(base_step) => {
                let combined = base_step.merged_with(overlay_step);
                merged.insert(name.clone(), combined);
            }
            None => {
                merged.insert(name.clone(), overlay_step.clone());
            }
        }
    }
    merged
}

/// Node kind: `steps` entries terminate, `services` entries are
/// long-lived and detach by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    #[default]
    Step,
    Service,
}

/// Keep-alive policy controlling the bulk kill/remove passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepAlive {
    /// Container survives between runs
    Yes,
    /// Container is disposable
    No,
    /// Container is replaced on every run
    Replace,
}

/// A single pipeline node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, stamped from the map key during normalization
    #[serde(skip)]
    pub name: String,

    /// Node kind, stamped during normalization
    #[serde(skip)]
    pub kind: StepKind,

    /// Image reference (mutually exclusive with `build`)
    #[serde(default)]
    pub image: Option<String>,

    /// Build context (mutually exclusive with `image`)
    #[serde(default)]
    pub build: Option<BuildInfo>,

    /// Volume mounts, `host:container[:mode]`
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Environment bindings, `NAME=value`
    #[serde(default)]
    pub environment: Vec<String>,

    /// Explicit ordering dependencies
    #[serde(default)]
    pub after: Vec<String>,

    /// Implicit dependencies
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Entrypoint override
    #[serde(default)]
    pub entrypoint: Option<StringOrList>,

    /// Command override
    #[serde(default)]
    pub command: Option<StringOrList>,

    /// Restart policy passed through to the runtime
    #[serde(default)]
    pub restart: Option<String>,

    /// Top-level ignore flag, folded into `meta`
    #[serde(default)]
    pub ignore: Option<bool>,

    /// Top-level detach flag
    #[serde(default)]
    pub detach: Option<bool>,

    /// Top-level keep-alive policy, folded into `meta`
    #[serde(default)]
    pub keep_alive: Option<KeepAlive>,

    /// Engine policy block
    #[serde(default)]
    pub meta: Meta,
}

impl Step {
    /// Dependencies of this step, `after` then `depends_on`.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.after
            .iter()
            .chain(self.depends_on.iter())
            .map(String::as_str)
    }

    /// Effective keep-alive policy. Valid after normalization.
    pub fn keep_alive_policy(&self) -> KeepAlive {
        self.meta.keep_alive.unwrap_or(match self.kind {
            StepKind::Service => KeepAlive::Yes,
            StepKind::Step => KeepAlive::No,
        })
    }

    /// Whether the container is started detached.
    pub fn is_detached(&self) -> bool {
        self.detach.unwrap_or(self.kind == StepKind::Service)
    }

    /// Container name derived from the step name.
    pub fn container_name(&self) -> String {
        self.name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Image reference: the declared image, or a derived tag for
    /// built steps.
    pub fn image_reference(&self) -> String {
        self.image
            .clone()
            .unwrap_or_else(|| format!("derrick/{}", self.container_name()))
    }

    fn normalize(&mut self, name: &str, kind: StepKind) {
        self.name = name.to_string();
        self.kind = kind;
        if self.ignore == Some(true) {
            self.meta.ignore = true;
        }
        if let Some(keep_alive) = self.keep_alive {
            self.meta.keep_alive = Some(keep_alive);
        }
        self.meta.keep_alive = Some(self.keep_alive_policy());
    }

    /// Merge an overlay step onto this one: scalars override, lists
    /// concatenate overlay-last.
    pub fn merged_with(&self, overlay: &Step) -> Step {
        let mut merged = self.clone();
        if overlay.image.is_some() {
            merged.image = overlay.image.clone();
        }
        if overlay.build.is_some() {
            merged.build = overlay.build.clone();
        }
        merged.volumes.extend(overlay.volumes.iter().cloned());
        merged.environment.extend(overlay.environment.iter().cloned());
        merged.after.extend(overlay.after.iter().cloned());
        merged.depends_on.extend(overlay.depends_on.iter().cloned());
        if overlay.entrypoint.is_some() {
            merged.entrypoint = overlay.entrypoint.clone();
        }
        if overlay.command.is_some() {
            merged.command = overlay.command.clone();
        }
        if overlay.restart.is_some() {
            merged.restart = overlay.restart.clone();
        }
        if overlay.ignore.is_some() {
            merged.ignore = overlay.ignore;
        }
        if overlay.detach.is_some() {
            merged.detach = overlay.detach;
        }
        if overlay.keep_alive.is_some() {
            merged.keep_alive = overlay.keep_alive;
        }
        merged.meta = self.meta.merged_with(&overlay.meta);
        merged
    }
}

/// Build context, either a bare path or a detailed mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildInfo {
    /// `build: ./dir`
    Context(String),

    /// `build: { context: ./dir, dockerfile: ... }`
    Detailed {
        context: String,
        #[serde(default)]
        dockerfile: Option<PathBuf>,
    },
}

impl BuildInfo {
    /// The build context directory
    pub fn context(&self) -> &str {
        match self {
            Self::Context(context) => context,
            Self::Detailed { context, .. } => context,
        }
    }

    /// Dockerfile override, if any
    pub fn dockerfile(&self) -> Option<&Path> {
        match self {
            Self::Context(_) => None,
            Self::Detailed { dockerfile, .. } => dockerfile.as_deref(),
        }
    }
}

/// Compose-style scalar-or-sequence field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    Single(String),
    Multiple(Vec<String>),
}

impl StringOrList {
    /// Flatten to an argument vector; single strings split on
    /// whitespace.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Single(s) => s.split_whitespace().map(String::from).collect(),
            Self::Multiple(v) => v.clone(),
        }
    }
}

/// Per-step engine policy, orthogonal to container semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Route every runner verb for this step to the no-op runner
    #[serde(default)]
    pub ignore: bool,

    /// Keep-alive policy; resolved during normalization
    #[serde(default)]
    pub keep_alive: Option<KeepAlive>,

    /// Step type; `noop` steps never touch the runtime
    #[serde(rename = "type", default)]
    pub step_type: Option<StepType>,

    /// Stdout target for the container run
    #[serde(default)]
    pub stdout: Option<LogTarget>,

    /// Stderr target for the container run
    #[serde(default)]
    pub stderr: Option<LogTarget>,
}

impl Meta {
    /// Effective step type.
    pub fn step_type(&self) -> StepType {
        self.step_type.unwrap_or(StepType::Run)
    }

    fn merged_with(&self, overlay: &Meta) -> Meta {
        Meta {
            ignore: self.ignore || overlay.ignore,
            keep_alive: overlay.keep_alive.or(self.keep_alive),
            step_type: overlay.step_type.or(self.step_type),
            stdout: overlay.stdout.clone().or_else(|| self.stdout.clone()),
            stderr: overlay.stderr.clone().or_else(|| self.stderr.clone()),
        }
    }
}

/// Step type for runner dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Dispatched to the live runner
    Run,
    /// Dispatched to the no-op runner regardless of content
    Noop,
}

/// Target for a container's output stream
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LogTarget {
    /// Stream to the orchestrator's own stdio
    #[default]
    Inherit,
    /// Drop the stream
    Discard,
    /// Append the stream to a host file
    File(PathBuf),
}

impl Serialize for LogTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Inherit => serializer.serialize_str("inherit"),
            Self::Discard => serializer.serialize_str("discard"),
            Self::File(path) => serializer.serialize_str(&path.to_string_lossy()),
        }
    }
}

impl<'de> Deserialize<'de> for LogTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "inherit" => Self::Inherit,
            "discard" => Self::Discard,
            _ => Self::File(PathBuf::from(raw)),
        })
    }
}
