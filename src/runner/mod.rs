// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Runner capability
//!
//! The abstract verbs the engine drives against a container runtime.
//! The engine never shells out itself; every container, image and
//! network operation goes through a `Runner` handle selected by the
//! per-step dispatcher.

mod docker;
mod noop;

pub use docker::DockerRunner;
pub use noop::NoopRunner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DerrickResult;
use crate::pipeline::Step;

/// Name of the pipeline's container network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network(pub String);

impl Network {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Network {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Behavioral capability over containers, images and networks.
///
/// Implementations are stateless from the engine's point of view and
/// shared behind `Arc` handles.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Build the step's image from its build context.
    async fn build_image(&self, step: &Step) -> DerrickResult<()>;

    /// Probe whether the step's image reference exists locally.
    async fn image_exists(&self, step: &Step) -> DerrickResult<bool>;

    /// Pull the step's image reference.
    async fn pull_image(&self, step: &Step) -> DerrickResult<()>;

    /// Kill the step's container.
    async fn kill_container(&self, step: &Step) -> DerrickResult<()>;

    /// Remove the step's container.
    async fn remove_container(&self, step: &Step) -> DerrickResult<()>;

    /// Run the step's container attached to `network`.
    async fn run_container(&self, step: &Step, network: &Network) -> DerrickResult<()>;

    /// Read the step's container logs, optionally following.
    async fn container_logs(&self, step: &Step, follow: bool) -> DerrickResult<()>;

    /// Create the pipeline network.
    async fn create_network(&self, network: &Network) -> DerrickResult<()>;

    /// Remove the pipeline network.
    async fn remove_network(&self, network: &Network) -> DerrickResult<()>;
}

/// Instrumentation keys, `Verb(primaryName[,secondary])`.
///
/// The key shape is part of the testable contract; both runners and
/// the runner-error payloads use these constructors.
pub mod keys {
    use super::Network;

    pub fn image_builder(step: &str) -> String {
        format!("ImageBuilder({step})")
    }

    pub fn image_existence_checker(step: &str) -> String {
        format!("ImageExistenceChecker({step})")
    }

    pub fn image_puller(step: &str) -> String {
        format!("ImagePuller({step})")
    }

    pub fn container_killer(step: &str) -> String {
        format!("ContainerKiller({step})")
    }

    pub fn container_remover(step: &str) -> String {
        format!("ContainerRemover({step})")
    }

    pub fn container_runner(step: &str, network: &Network) -> String {
        format!("ContainerRunner({step},{network})")
    }

    pub fn container_log_reader(step: &str, follow: bool) -> String {
        format!("ContainerLogReader({step},{follow})")
    }

    pub fn network_creator(network: &Network) -> String {
        format!("NetworkCreator({network})")
    }

    pub fn network_remover(network: &Network) -> String {
        format!("NetworkRemover({network})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shapes() {
        let network = Network::from("test");
        assert_eq!(keys::image_puller("b"), "ImagePuller(b)");
        assert_eq!(keys::container_runner("a", &network), "ContainerRunner(a,test)");
        assert_eq!(
            keys::container_log_reader("a", false),
            "ContainerLogReader(a,false)"
        );
        assert_eq!(keys::network_creator(&network), "NetworkCreator(test)");
    }
}
