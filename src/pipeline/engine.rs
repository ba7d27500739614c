// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Execution engine
//!
//! Drives the runners for a loaded pipeline: image build/pull with
//! force semantics, bulk kill/remove with pre-run filtering, network
//! lifecycle, layered concurrent step execution with cooperative
//! cancellation, plan-ordered log reading, and temp-directory
//! cleanup through a synthetic step.

use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{DerrickError, DerrickResult};
use crate::pipeline::{
    ExecutionPlan, KeepAlive, Meta, PipelineDefinition, Step, StepType, StringOrList,
};
use crate::preprocessor::TempDirectory;
use crate::runner::{DockerRunner, Network, NoopRunner, Runner};

/// Image used by the synthetic temp-directory cleanup step.
const CLEANUP_IMAGE: &str = "busybox:latest";

/// Mount point of the temp directory inside the cleanup container.
const CLEANUP_MOUNT: &str = "/data";

/// A loaded pipeline and the handles needed to execute it.
pub struct Pipeline {
    /// Merged and normalized definition
    pub definition: PipelineDefinition,

    /// Container network the steps attach to
    pub network: Network,

    plan: ExecutionPlan,
    pub(crate) local_runner: Arc<dyn Runner>,
    pub(crate) noop_runner: Arc<dyn Runner>,
    temp_dirs: Vec<TempDirectory>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("definition", &self.definition)
            .field("network", &self.network)
            .field("plan", &self.plan)
            .field("temp_dirs", &self.temp_dirs)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline with the default runner pair (docker live,
    /// counting no-op).
    pub fn new(
        definition: PipelineDefinition,
        plan: ExecutionPlan,
        temp_dirs: Vec<TempDirectory>,
    ) -> Self {
        Self {
            definition,
            network: Network::default(),
            plan,
            local_runner: Arc::new(DockerRunner::new()),
            noop_runner: Arc::new(NoopRunner::new(false)),
            temp_dirs,
        }
    }

    /// Replace both runner handles.
    pub fn with_runners(mut self, local: Arc<dyn Runner>, noop: Arc<dyn Runner>) -> Self {
        self.local_runner = local;
        self.noop_runner = noop;
        self
    }

    /// The layered execution plan.
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Temp directories registered by the preprocessor.
    pub fn temp_dirs(&self) -> &[TempDirectory] {
        &self.temp_dirs
    }

    /// Select the runner for a step's policy block.
    ///
    /// No-op steps never touch the runtime; ignored steps should have
    /// been dropped from the graph, and routing residuals to the
    /// no-op runner defends against them.
    pub fn runner_for_meta(&self, meta: &Meta) -> Arc<dyn Runner> {
        if meta.step_type() == StepType::Noop || meta.ignore {
            Arc::clone(&self.noop_runner)
        } else {
            Arc::clone(&self.local_runner)
        }
    }

    /// Steps in plan order (layers flattened).
    fn planned_steps(&self) -> DerrickResult<Vec<&Step>> {
        self.plan
            .step_names()
            .map(|name| {
                self.definition
                    .step(name)
                    .ok_or_else(|| DerrickError::StepNotFound {
                        step: name.to_string(),
                    })
            })
            .collect()
    }

    /// Verify that every live step carries exactly one of image and
    /// build context.
    pub fn check(&self) -> DerrickResult<()> {
        for step in self.planned_steps()? {
            let routed_away =
                step.meta.step_type() == StepType::Noop || step.meta.ignore;
            if routed_away {
                continue;
            }
            if step.image.is_some() == step.build.is_some() {
                return Err(DerrickError::MissingContainerInformation {
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Build images for steps declaring a build context.
    ///
    /// Without `force`, images that already exist are skipped.
    pub async fn build_images(&self, force: bool) -> DerrickResult<()> {
        for step in self.planned_steps()? {
            if step.build.is_none() {
                continue;
            }
            let runner = self.runner_for_meta(&step.meta);
            if !force && runner.image_exists(step).await? {
                tracing::debug!(step = %step.name, "image present, skipping build");
                continue;
            }
            runner.build_image(step).await?;
        }
        Ok(())
    }

    /// Pull images for steps declaring an image reference.
    ///
    /// The existence probe always runs; `force` pulls regardless of
    /// its answer.
    pub async fn pull_images(&self, force: bool) -> DerrickResult<()> {
        for step in self.planned_steps()? {
            if step.image.is_none() {
                continue;
            }
            let runner = self.runner_for_meta(&step.meta);
            let exists = runner.image_exists(step).await?;
            if force || !exists {
                runner.pull_image(step).await?;
            }
        }
        Ok(())
    }

    /// Kill and remove every step's container.
    ///
    /// In pre-run mode, containers whose keep-alive policy is not
    /// `no` survive; `replace` containers are instead replaced by the
    /// per-step pass inside [`Pipeline::execute_steps`].
    pub async fn kill_containers(&self, pre_run: bool) -> DerrickResult<()> {
        for step in self.planned_steps()? {
            if pre_run && step.keep_alive_policy() != KeepAlive::No {
                continue;
            }
            let runner = self.runner_for_meta(&step.meta);
            runner.kill_container(step).await?;
            runner.remove_container(step).await?;
        }
        Ok(())
    }

    /// Remove every step's container, same pre-run filter as
    /// [`Pipeline::kill_containers`].
    pub async fn remove_containers(&self, pre_run: bool) -> DerrickResult<()> {
        for step in self.planned_steps()? {
            if pre_run && step.keep_alive_policy() != KeepAlive::No {
                continue;
            }
            self.runner_for_meta(&step.meta).remove_container(step).await?;
        }
        Ok(())
    }

    /// Create the pipeline network. No-op without a network name.
    pub async fn create_network(&self) -> DerrickResult<()> {
        if self.network.is_empty() {
            return Ok(());
        }
        self.local_runner.create_network(&self.network).await
    }

    /// Remove the pipeline network. No-op without a network name.
    pub async fn remove_network(&self) -> DerrickResult<()> {
        if self.network.is_empty() {
            return Ok(());
        }
        self.local_runner.remove_network(&self.network).await
    }

    /// Execute the plan, layer by layer.
    ///
    /// Each step runs on one worker (kill stale, remove stale, run,
    /// serially); workers of a layer run concurrently behind a strict
    /// barrier. The first failure of a non-detached step cancels its
    /// peers cooperatively and short-circuits the remaining layers.
    pub async fn execute_steps(&self) -> DerrickResult<()> {
        for layer in self.plan.layers() {
            let cancel = CancelFlag::default();
            let mut workers = Vec::with_capacity(layer.len());
            for name in layer {
                let step = self
                    .definition
                    .step(name)
                    .ok_or_else(|| DerrickError::StepNotFound { step: name.clone() })?
                    .clone();
                let runner = self.runner_for_meta(&step.meta);
                let network = self.network.clone();
                let cancel = cancel.clone();
                let name = name.clone();
                let handle = tokio::spawn(async move {
                    run_step(runner, &step, &network, &cancel).await
                });
                workers.push((name, handle));
            }

            let mut first_error: Option<DerrickError> = None;
            for (name, handle) in workers {
                let result = handle.await.unwrap_or_else(|e| {
                    Err(DerrickError::Execution {
                        message: format!("worker for step '{name}' panicked: {e}"),
                    })
                });
                match result {
                    Ok(()) => println!("  {} {}", "✓".green(), name.bold()),
                    Err(err) if err.is_cancellation() => {
                        println!("  {} {} {}", "-".dimmed(), name.bold(), "(cancelled)".dimmed());
                    }
                    Err(err) => {
                        println!("  {} {} failed", "✗".red(), name.bold());
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }

            if let Some(err) = first_error {
                self.cleanup_layer(layer).await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Best-effort kill+remove pass over a failed layer.
    async fn cleanup_layer(&self, layer: &[String]) {
        for name in layer {
            let Some(step) = self.definition.step(name) else {
                continue;
            };
            let runner = self.runner_for_meta(&step.meta);
            if let Err(err) = runner.kill_container(step).await {
                tracing::warn!(step = %name, %err, "cleanup kill failed");
            }
            if let Err(err) = runner.remove_container(step).await {
                tracing::warn!(step = %name, %err, "cleanup remove failed");
            }
        }
    }

    /// Read container logs in plan order for reproducible
    /// interleaving.
    pub async fn logs(&self, follow: bool) -> DerrickResult<()> {
        for step in self.planned_steps()? {
            self.runner_for_meta(&step.meta)
                .container_logs(step, follow)
                .await?;
        }
        Ok(())
    }

    /// Clear the contents of every registered temp directory.
    ///
    /// Reuses the normal container lifecycle through a synthetic
    /// `TempDirCleanUp` step per registry entry: kill, defensive
    /// remove, run, remove.
    pub async fn remove_temp_dir_data(&self) -> DerrickResult<()> {
        for entry in &self.temp_dirs {
            tracing::info!(
                variable = %entry.variable,
                path = %entry.path.display(),
                "clearing temp directory"
            );
            let step = cleanup_step(entry);
            let runner = self.runner_for_meta(&step.meta);
            runner.kill_container(&step).await?;
            runner.remove_container(&step).await?;
            runner.run_container(&step, &self.network).await?;
            runner.remove_container(&step).await?;
        }
        Ok(())
    }
}

/// Synthetic cleanup step for one temp-directory entry.
fn cleanup_step(entry: &TempDirectory) -> Step {
    Step {
        name: "TempDirCleanUp".to_string(),
        image: Some(CLEANUP_IMAGE.to_string()),
        volumes: vec![format!("{}:{}", entry.path.display(), CLEANUP_MOUNT)],
        command: Some(StringOrList::Multiple(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("rm -rf {CLEANUP_MOUNT}/*"),
        ])),
        ..Step::default()
    }
}

/// Cooperative cancellation flag shared by the workers of a layer.
#[derive(Clone, Default)]
struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drive one step through kill → remove → run, observing the
/// cancellation flag between runner calls.
async fn run_step(
    runner: Arc<dyn Runner>,
    step: &Step,
    network: &Network,
    cancel: &CancelFlag,
) -> DerrickResult<()> {
    let result = drive_step(&runner, step, network, cancel).await;
    if let Err(err) = &result {
        // A failing non-detached step aborts the layer.
        if !err.is_cancellation() && !step.is_detached() {
            cancel.cancel();
        }
    }
    result
}

async fn drive_step(
    runner: &Arc<dyn Runner>,
    step: &Step,
    network: &Network,
    cancel: &CancelFlag,
) -> DerrickResult<()> {
    if cancel.is_cancelled() {
        return Err(DerrickError::Cancelled);
    }
    runner.kill_container(step).await?;
    if cancel.is_cancelled() {
        return Err(DerrickError::Cancelled);
    }
    runner.remove_container(step).await?;
    if cancel.is_cancelled() {
        return Err(DerrickError::Cancelled);
    }
    runner.run_container(step, network).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::loader;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::path::Path;

    const DEF: &str = r#"version: "2.0"
steps:
  a:
    image: alpine
  b:
    image: alpine
    after:
      - a
services:
  c:
    build:
      context: ./dummy
    depends_on:
      - b
"#;

    const ENV: &str = r#"steps:
  b:
    ignore: true
services:
  c:
    keep_alive: replace
"#;

    fn test_pipeline(
        definition: &str,
        environment: Option<&str>,
    ) -> (Pipeline, Arc<NoopRunner>, Arc<NoopRunner>) {
        let local = Arc::new(NoopRunner::new(false));
        let noop = Arc::new(NoopRunner::new(false));
        let mut pipeline = loader::from_sources(
            definition,
            environment,
            Path::new("."),
            HashMap::new(),
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .expect("pipeline loads");
        pipeline.network = Network::from("test");
        pipeline.local_runner = local.clone();
        pipeline.noop_runner = noop.clone();
        (pipeline, local, noop)
    }

    fn assert_counts(runner: &NoopRunner, key: &str, calls: usize, called: usize) {
        assert_eq!(runner.num_calls(key), calls, "calls for '{key}'");
        assert_eq!(runner.num_called(key), called, "called for '{key}'");
    }

    fn same_runner(a: &Arc<dyn Runner>, b: &Arc<dyn Runner>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(a) as *const (),
            Arc::as_ptr(b) as *const (),
        )
    }

    #[test]
    fn test_runner_for_meta() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        let local: Arc<dyn Runner> = local;
        let noop: Arc<dyn Runner> = noop;

        let cases: &[(&str, &Arc<dyn Runner>)] =
            &[("a", &local), ("b", &noop), ("c", &local)];
        for (name, expected) in cases {
            let meta = &pipeline.definition.step(name).unwrap().meta;
            assert!(
                same_runner(&pipeline.runner_for_meta(meta), expected),
                "incorrect runner for '{name}'"
            );
        }
    }

    #[test]
    fn test_plan_layers() {
        let (pipeline, _, _) = test_pipeline(DEF, Some(ENV));
        assert_eq!(
            pipeline.plan().layers(),
            &[vec!["a"], vec!["b"], vec!["c"]]
        );
    }

    #[tokio::test]
    async fn test_build_images() {
        let (pipeline, local, _) = test_pipeline(DEF, Some(ENV));
        pipeline.build_images(false).await.unwrap();
        // The recorder reports the image present, so the build is
        // skipped after the probe.
        assert_counts(&local, "ImageExistenceChecker(c)", 1, 1);
        assert_counts(&local, "ImageBuilder(c)", 0, 0);
        assert_counts(&local, "ImageBuilder(a)", 0, 0);
    }

    #[tokio::test]
    async fn test_build_images_forced() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.build_images(true).await.unwrap();
        assert_counts(&local, "ImageExistenceChecker(c)", 0, 0);
        assert_counts(&local, "ImageBuilder(c)", 1, 1);
        assert_counts(&noop, "ImageBuilder(b)", 0, 0);
    }

    #[tokio::test]
    async fn test_pull_images() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.pull_images(false).await.unwrap();
        assert_counts(&local, "ImageExistenceChecker(a)", 1, 1);
        assert_counts(&noop, "ImageExistenceChecker(b)", 1, 1);
        assert_counts(&local, "ImageExistenceChecker(c)", 0, 0);
        assert_counts(&local, "ImagePuller(a)", 0, 0);
        assert_counts(&noop, "ImagePuller(b)", 0, 0);
        assert_counts(&local, "ImagePuller(c)", 0, 0);
    }

    #[tokio::test]
    async fn test_pull_images_forced() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.pull_images(true).await.unwrap();
        assert_counts(&local, "ImageExistenceChecker(a)", 1, 1);
        assert_counts(&noop, "ImageExistenceChecker(b)", 1, 1);
        assert_counts(&local, "ImageExistenceChecker(c)", 0, 0);
        assert_counts(&local, "ImagePuller(a)", 1, 1);
        assert_counts(&noop, "ImagePuller(b)", 1, 1);
        assert_counts(&local, "ImagePuller(c)", 0, 0);
    }

    #[tokio::test]
    async fn test_kill_containers() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.kill_containers(false).await.unwrap();
        assert_counts(&local, "ContainerKiller(a)", 1, 1);
        assert_counts(&noop, "ContainerKiller(b)", 1, 1);
        assert_counts(&local, "ContainerKiller(c)", 1, 1);
        assert_counts(&local, "ContainerRemover(a)", 1, 1);
        assert_counts(&noop, "ContainerRemover(b)", 1, 1);
        assert_counts(&local, "ContainerRemover(c)", 1, 1);
    }

    #[tokio::test]
    async fn test_kill_containers_pre_run() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.kill_containers(true).await.unwrap();
        assert_counts(&local, "ContainerKiller(a)", 1, 1);
        assert_counts(&noop, "ContainerKiller(b)", 1, 1);
        // c keeps alive (replace) and is preserved by the bulk pass.
        assert_counts(&local, "ContainerKiller(c)", 0, 0);
        assert_counts(&local, "ContainerRemover(a)", 1, 1);
        assert_counts(&noop, "ContainerRemover(b)", 1, 1);
        assert_counts(&local, "ContainerRemover(c)", 0, 0);
    }

    #[tokio::test]
    async fn test_remove_containers() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.remove_containers(false).await.unwrap();
        assert_counts(&local, "ContainerRemover(a)", 1, 1);
        assert_counts(&noop, "ContainerRemover(b)", 1, 1);
        assert_counts(&local, "ContainerRemover(c)", 1, 1);
        assert_counts(&local, "ContainerKiller(a)", 0, 0);
    }

    #[tokio::test]
    async fn test_remove_containers_pre_run() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.remove_containers(true).await.unwrap();
        assert_counts(&local, "ContainerRemover(a)", 1, 1);
        assert_counts(&noop, "ContainerRemover(b)", 1, 1);
        assert_counts(&local, "ContainerRemover(c)", 0, 0);
    }

    #[tokio::test]
    async fn test_create_network() {
        let (pipeline, local, _) = test_pipeline(DEF, Some(ENV));
        pipeline.create_network().await.unwrap();
        assert_counts(&local, "NetworkCreator(test)", 1, 1);
    }

    #[tokio::test]
    async fn test_remove_network() {
        let (pipeline, local, _) = test_pipeline(DEF, Some(ENV));
        pipeline.remove_network().await.unwrap();
        assert_counts(&local, "NetworkRemover(test)", 1, 1);
    }

    #[tokio::test]
    async fn test_empty_network_is_noop() {
        let (mut pipeline, local, _) = test_pipeline(DEF, Some(ENV));
        pipeline.network = Network::default();
        pipeline.create_network().await.unwrap();
        pipeline.remove_network().await.unwrap();
        assert_counts(&local, "NetworkCreator()", 0, 0);
    }

    #[tokio::test]
    async fn test_execute_steps() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.execute_steps().await.unwrap();
        assert_counts(&local, "ContainerKiller(a)", 1, 1);
        assert_counts(&local, "ContainerRemover(a)", 1, 1);
        assert_counts(&local, "ContainerRunner(a,test)", 1, 1);
        assert_counts(&noop, "ContainerKiller(b)", 1, 1);
        assert_counts(&noop, "ContainerRemover(b)", 1, 1);
        assert_counts(&noop, "ContainerRunner(b,test)", 1, 1);
        assert_counts(&local, "ContainerKiller(c)", 1, 1);
        assert_counts(&local, "ContainerRemover(c)", 1, 1);
        assert_counts(&local, "ContainerRunner(c,test)", 1, 1);
    }

    #[tokio::test]
    async fn test_logs() {
        let (pipeline, local, noop) = test_pipeline(DEF, Some(ENV));
        pipeline.logs(false).await.unwrap();
        assert_counts(&local, "ContainerLogReader(a,false)", 1, 1);
        assert_counts(&noop, "ContainerLogReader(b,false)", 1, 1);
        assert_counts(&local, "ContainerLogReader(c,false)", 1, 1);
    }

    #[tokio::test]
    async fn test_remove_temp_dir_data() {
        let definition = "version: \"2.0\"\n#! TEMP_DIR_IF_EMPTY ${TEMP_STORAGE}\nsteps:\n  a:\n    volumes:\n    - ${TEMP_STORAGE}:/input\n";
        let (pipeline, local, _) = test_pipeline(definition, Some(ENV));
        pipeline.remove_temp_dir_data().await.unwrap();
        assert_counts(&local, "ContainerKiller(TempDirCleanUp)", 1, 1);
        assert_counts(&local, "ContainerRemover(TempDirCleanUp)", 2, 2);
        assert_counts(&local, "ContainerRunner(TempDirCleanUp,test)", 1, 1);
        for entry in pipeline.temp_dirs() {
            std::fs::remove_dir_all(&entry.path).unwrap();
        }
    }

    #[tokio::test]
    async fn test_remove_temp_dir_data_without_registry() {
        let definition = "version: \"2.0\"\nsteps:\n  a:\n";
        let (pipeline, local, _) = test_pipeline(definition, None);
        pipeline.remove_temp_dir_data().await.unwrap();
        assert_counts(&local, "ContainerKiller(TempDirCleanUp)", 0, 0);
        assert_counts(&local, "ContainerRemover(TempDirCleanUp)", 0, 0);
        assert_counts(&local, "ContainerRunner(TempDirCleanUp,test)", 0, 0);
    }

    #[test]
    fn test_check() {
        let (pipeline, _, _) = test_pipeline(DEF, None);
        pipeline.check().unwrap();
    }

    #[test]
    fn test_check_missing_container_information() {
        let (pipeline, _, _) = test_pipeline("version: \"2.0\"\nsteps:\n  a:\n", None);
        let err = pipeline.check().unwrap_err();
        assert!(matches!(
            err,
            DerrickError::MissingContainerInformation { step } if step == "a"
        ));
    }

    /// Recorder whose `run_container` fails for one step name.
    struct FailingRunner {
        fail_on: &'static str,
        inner: NoopRunner,
    }

    #[async_trait]
    impl Runner for FailingRunner {
        async fn build_image(&self, step: &Step) -> DerrickResult<()> {
            self.inner.build_image(step).await
        }
        async fn image_exists(&self, step: &Step) -> DerrickResult<bool> {
            self.inner.image_exists(step).await
        }
        async fn pull_image(&self, step: &Step) -> DerrickResult<()> {
            self.inner.pull_image(step).await
        }
        async fn kill_container(&self, step: &Step) -> DerrickResult<()> {
            self.inner.kill_container(step).await
        }
        async fn remove_container(&self, step: &Step) -> DerrickResult<()> {
            self.inner.remove_container(step).await
        }
        async fn run_container(&self, step: &Step, network: &Network) -> DerrickResult<()> {
            self.inner.run_container(step, network).await?;
            if step.name == self.fail_on {
                return Err(DerrickError::runner(
                    crate::runner::keys::container_runner(&step.name, network),
                    "boom",
                ));
            }
            Ok(())
        }
        async fn container_logs(&self, step: &Step, follow: bool) -> DerrickResult<()> {
            self.inner.container_logs(step, follow).await
        }
        async fn create_network(&self, network: &Network) -> DerrickResult<()> {
            self.inner.create_network(network).await
        }
        async fn remove_network(&self, network: &Network) -> DerrickResult<()> {
            self.inner.remove_network(network).await
        }
    }

    #[tokio::test]
    async fn test_execute_steps_failure_short_circuits_layers() {
        let definition = "version: \"2.0\"\nsteps:\n  a:\n    image: alpine\n  z:\n    image: alpine\n    after:\n      - a\n";
        let local = Arc::new(FailingRunner {
            fail_on: "a",
            inner: NoopRunner::new(false),
        });
        let mut pipeline = loader::from_sources(
            definition,
            None,
            Path::new("."),
            HashMap::new(),
            BTreeSet::new(),
            BTreeSet::new(),
        )
        .unwrap();
        pipeline.network = Network::from("test");
        pipeline.local_runner = local.clone();

        let err = pipeline.execute_steps().await.unwrap_err();
        assert!(matches!(err, DerrickError::Runner { ref key, .. }
            if key == "ContainerRunner(a,test)"));
        // The failing layer aborts the run before z is dispatched.
        assert_eq!(local.inner.num_calls("ContainerRunner(z,test)"), 0);
    }
}
