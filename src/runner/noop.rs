// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! No-op runner
//!
//! Performs no runtime work; records per-key counters instead. Steps
//! routed away from the live runner land here, and tests substitute
//! both pipeline runners with counting instances.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{keys, Network, Runner};
use crate::errors::DerrickResult;
use crate::pipeline::Step;

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    /// Verb invocations begun
    calls: usize,
    /// Verb invocations completed
    called: usize,
}

/// Counting no-op implementation of the [`Runner`] capability.
#[derive(Debug, Default)]
pub struct NoopRunner {
    verbose: bool,
    counters: Mutex<HashMap<String, Counter>>,
}

impl NoopRunner {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Number of invocations begun for `key`.
    pub fn num_calls(&self, key: &str) -> usize {
        self.counters
            .lock()
            .expect("counter lock")
            .get(key)
            .map_or(0, |c| c.calls)
    }

    /// Number of invocations completed for `key`.
    pub fn num_called(&self, key: &str) -> usize {
        self.counters
            .lock()
            .expect("counter lock")
            .get(key)
            .map_or(0, |c| c.called)
    }

    fn record(&self, key: String) {
        if self.verbose {
            tracing::debug!(%key, "noop runner verb");
        }
        let mut counters = self.counters.lock().expect("counter lock");
        let counter = counters.entry(key).or_default();
        counter.calls += 1;
        counter.called += 1;
    }
}

#[async_trait]
impl Runner for NoopRunner {
    async fn build_image(&self, step: &Step) -> DerrickResult<()> {
        self.record(keys::image_builder(&step.name));
        Ok(())
    }

    async fn image_exists(&self, step: &Step) -> DerrickResult<bool> {
        self.record(keys::image_existence_checker(&step.name));
        // Reported present so that unforced pulls and builds are
        // skipped.
        Ok(true)
    }

    async fn pull_image(&self, step: &Step) -> DerrickResult<()> {
        self.record(keys::image_puller(&step.name));
        Ok(())
    }

    async fn kill_container(&self, step: &Step) -> DerrickResult<()> {
        self.record(keys::container_killer(&step.name));
        Ok(())
    }

    async fn remove_container(&self, step: &Step) -> DerrickResult<()> {
        self.record(keys::container_remover(&step.name));
        Ok(())
    }

    async fn run_container(&self, step: &Step, network: &Network) -> DerrickResult<()> {
        self.record(keys::container_runner(&step.name, network));
        Ok(())
    }

    async fn container_logs(&self, step: &Step, follow: bool) -> DerrickResult<()> {
        self.record(keys::container_log_reader(&step.name, follow));
        Ok(())
    }

    async fn create_network(&self, network: &Network) -> DerrickResult<()> {
        self.record(keys::network_creator(network));
        Ok(())
    }

    async fn remove_network(&self, network: &Network) -> DerrickResult<()> {
        self.record(keys::network_remover(network));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str) -> Step {
        Step {
            name: name.to_string(),
            ..Step::default()
        }
    }

    #[tokio::test]
    async fn test_counters_accumulate_per_key() {
        let runner = NoopRunner::new(false);
        let a = step("a");
        runner.pull_image(&a).await.unwrap();
        runner.pull_image(&a).await.unwrap();
        runner.kill_container(&a).await.unwrap();

        assert_eq!(runner.num_calls("ImagePuller(a)"), 2);
        assert_eq!(runner.num_called("ImagePuller(a)"), 2);
        assert_eq!(runner.num_calls("ContainerKiller(a)"), 1);
        assert_eq!(runner.num_calls("ContainerRemover(a)"), 0);
    }

    #[tokio::test]
    async fn test_image_exists_reports_present() {
        let runner = NoopRunner::new(false);
        assert!(runner.image_exists(&step("a")).await.unwrap());
        assert_eq!(runner.num_called("ImageExistenceChecker(a)"), 1);
    }
}
