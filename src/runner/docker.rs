// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Docker runner
//!
//! Live implementation of the [`Runner`] capability driving the
//! `docker` CLI. Kill and remove are best-effort: a missing container
//! is not an error, so the engine's defensive pre-run passes stay
//! quiet on a clean host.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use super::{keys, Network, Runner};
use crate::errors::{DerrickError, DerrickResult};
use crate::pipeline::{LogTarget, Step};

/// Runner backed by the local `docker` binary.
pub struct DockerRunner {
    binary: PathBuf,
}

impl DockerRunner {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("docker"),
        }
    }

    /// Use a specific runtime binary (e.g. `podman`).
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn output(&self, key: &str, args: &[String]) -> DerrickResult<std::process::Output> {
        tracing::debug!(%key, ?args, "runtime invocation");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DerrickError::runner(key, e.to_string()))
    }

    /// Run a command whose failure is a runner error.
    async fn run_checked(&self, key: &str, args: &[String]) -> DerrickResult<()> {
        let output = self.output(key, args).await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(DerrickError::runner(key, stderr))
        }
    }

    /// Run a command whose failure is tolerated.
    async fn run_best_effort(&self, key: &str, args: &[String]) -> DerrickResult<()> {
        let output = self.output(key, args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(%key, stderr = %stderr.trim(), "ignored runtime failure");
        }
        Ok(())
    }
}

impl Default for DockerRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn build_args(step: &Step) -> Vec<String> {
    let mut args = vec!["build".to_string(), "-t".to_string(), step.image_reference()];
    if let Some(build) = &step.build {
        if let Some(dockerfile) = build.dockerfile() {
            args.push("-f".to_string());
            args.push(dockerfile.to_string_lossy().into_owned());
        }
        args.push(build.context().to_string());
    }
    args
}

fn run_args(step: &Step, network: &Network) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--name".to_string(), step.container_name()];
    if !network.is_empty() {
        args.push("--network".to_string());
        args.push(network.as_str().to_string());
    }
    if step.is_detached() {
        args.push("-d".to_string());
    }
    for volume in &step.volumes {
        args.push("-v".to_string());
        args.push(volume.clone());
    }
    for binding in &step.environment {
        args.push("-e".to_string());
        args.push(binding.clone());
    }
    if let Some(restart) = &step.restart {
        args.push("--restart".to_string());
        args.push(restart.clone());
    }
    let mut leading: Vec<String> = Vec::new();
    if let Some(entrypoint) = &step.entrypoint {
        // `--entrypoint` takes the binary only; further elements of a
        // list entrypoint become leading container arguments.
        let mut parts = entrypoint.to_args().into_iter();
        if let Some(binary) = parts.next() {
            args.push("--entrypoint".to_string());
            args.push(binary);
        }
        leading.extend(parts);
    }
    args.push(step.image_reference());
    args.extend(leading);
    if let Some(command) = &step.command {
        args.extend(command.to_args());
    }
    args
}

#[async_trait]
impl Runner for DockerRunner {
    async fn build_image(&self, step: &Step) -> DerrickResult<()> {
        let key = keys::image_builder(&step.name);
        self.run_checked(&key, &build_args(step)).await
    }

    async fn image_exists(&self, step: &Step) -> DerrickResult<bool> {
        let key = keys::image_existence_checker(&step.name);
        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            step.image_reference(),
        ];
        let output = self.output(&key, &args).await?;
        if !output.status.success() {
            return Ok(false);
        }
        // `docker image inspect` prints a JSON array of matches.
        let inspected: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| DerrickError::runner(&key, e.to_string()))?;
        Ok(inspected.as_array().is_some_and(|a| !a.is_empty()))
    }

    async fn pull_image(&self, step: &Step) -> DerrickResult<()> {
        let key = keys::image_puller(&step.name);
        let args = vec!["pull".to_string(), step.image_reference()];
        self.run_checked(&key, &args).await
    }

    async fn kill_container(&self, step: &Step) -> DerrickResult<()> {
        let key = keys::container_killer(&step.name);
        let args = vec!["kill".to_string(), step.container_name()];
        self.run_best_effort(&key, &args).await
    }

    async fn remove_container(&self, step: &Step) -> DerrickResult<()> {
        let key = keys::container_remover(&step.name);
        let args = vec!["rm".to_string(), step.container_name()];
        self.run_best_effort(&key, &args).await
    }

    async fn run_container(&self, step: &Step, network: &Network) -> DerrickResult<()> {
        let key = keys::container_runner(&step.name, network);
        let output = self.output(&key, &run_args(step, network)).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DerrickError::runner(&key, stderr));
        }
        write_stream(step.meta.stdout.as_ref(), &output.stdout, false)?;
        write_stream(step.meta.stderr.as_ref(), &output.stderr, true)?;
        Ok(())
    }

    async fn container_logs(&self, step: &Step, follow: bool) -> DerrickResult<()> {
        let key = keys::container_log_reader(&step.name, follow);
        let mut args = vec!["logs".to_string()];
        if follow {
            args.push("--follow".to_string());
        }
        args.push(step.container_name());
        tracing::debug!(%key, "runtime invocation");
        let status = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| DerrickError::runner(&key, e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(DerrickError::runner(&key, format!("exit status {status}")))
        }
    }

    async fn create_network(&self, network: &Network) -> DerrickResult<()> {
        let key = keys::network_creator(network);
        let args = vec![
            "network".to_string(),
            "create".to_string(),
            network.as_str().to_string(),
        ];
        let output = self.output(&key, &args).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("already exists") {
            tracing::debug!(%key, "network already exists");
            return Ok(());
        }
        Err(DerrickError::runner(&key, stderr))
    }

    async fn remove_network(&self, network: &Network) -> DerrickResult<()> {
        let key = keys::network_remover(network);
        let args = vec![
            "network".to_string(),
            "rm".to_string(),
            network.as_str().to_string(),
        ];
        self.run_checked(&key, &args).await
    }
}

/// Route a captured container stream to its configured target.
fn write_stream(target: Option<&LogTarget>, data: &[u8], to_stderr: bool) -> DerrickResult<()> {
    use std::io::Write;

    if data.is_empty() {
        return Ok(());
    }
    match target.unwrap_or(&LogTarget::Inherit) {
        LogTarget::Inherit => {
            if to_stderr {
                std::io::stderr().write_all(data)?;
            } else {
                std::io::stdout().write_all(data)?;
            }
        }
        LogTarget::Discard => {}
        LogTarget::File(path) => {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            file.write_all(data)?;
        }
    }
    Ok(())
}
