//! Cluster lifecycle facade.
//!
//! [`Cluster`] sequences the whole provisioning flow against one container:
//!
//! ```text
//! start: pull image -> create -> start -> wait for kubeconfig
//!        -> fetch + parse credentials -> wait for API port -> Running
//! stop:  stop container -> remove container -> Stopped
//! ```
//!
//! A failed `start` leaves the container as it was; callers clean up with
//! [`Cluster::cleanup`].
//!
//! ```rust,no_run
//! use k3t::{Cluster, ClusterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut cluster = Cluster::connect(ClusterConfig::with_port(7443)).await?;
//!     let credentials = cluster.start(&CancellationToken::new()).await?;
//!     assert!(!credentials.client_key.is_empty());
//!     cluster.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;

pub use config::ClusterConfig;

use crate::container::{
    ContainerClient, ContainerError, ContainerLifecycleManager, ContainerRuntime, ContainerState,
    ImageProvisioner, LifecycleStage,
};
use crate::credentials::{CredentialBundle, CredentialError, CredentialExtractor};
use crate::env;
use crate::readiness::{PortReadiness, ReadinessError, ReadinessProber};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Where a [`Cluster`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Unstarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterState::Unstarted => "unstarted",
            ClusterState::Starting => "starting",
            ClusterState::Running => "running",
            ClusterState::Stopping => "stopping",
            ClusterState::Stopped => "stopped",
            ClusterState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Cluster errors. Each variant names the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Connecting to container runtime failed")]
    Connect(#[source] ContainerError),

    #[error("Invalid cluster configuration: {0}")]
    Config(String),

    #[error("Cannot {operation} a cluster that is {state}")]
    InvalidState {
        operation: &'static str,
        state: ClusterState,
    },

    #[error("Image pull failed")]
    Pull(#[source] ContainerError),

    #[error("Container create failed")]
    Create(#[source] ContainerError),

    #[error("Container start failed")]
    Start(#[source] ContainerError),

    #[error("Waiting for kubeconfig failed")]
    Readiness(#[from] ReadinessError),

    #[error("Extracting credentials failed")]
    Credentials(#[from] CredentialError),

    #[error("Container stop failed")]
    Stop(#[source] ContainerError),

    #[error("Container remove failed")]
    Remove(#[source] ContainerError),

    #[error("Container cleanup failed")]
    Cleanup(#[source] ContainerError),

    #[error("Container inspect failed")]
    Inspect(#[source] ContainerError),
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// One ephemeral single-node cluster backed by one container.
///
/// Operations take `&mut self`: a handle drives its container from a single
/// task. Stopping the container is the caller's job; dropping the handle leaves
/// it running.
pub struct Cluster {
    config: ClusterConfig,
    images: ImageProvisioner,
    lifecycle: ContainerLifecycleManager,
    prober: ReadinessProber,
    extractor: CredentialExtractor,
    state: ClusterState,
}

impl Cluster {
    /// Create a cluster handle using an existing runtime client.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ClusterConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ClusterError::Config(e.to_string()))?;

        Ok(Self {
            images: ImageProvisioner::new(runtime.clone()),
            lifecycle: ContainerLifecycleManager::new(runtime.clone())
                .with_stop_timeout(config.stop_timeout_secs),
            prober: ReadinessProber::new(runtime.clone(), config.poll_policy()),
            extractor: CredentialExtractor::new(runtime),
            config,
            state: ClusterState::Unstarted,
        })
    }

    /// Create a cluster handle connected to the local Docker/Podman daemon.
    ///
    /// # Errors
    ///
    /// Returns error if no runtime is reachable or the configuration is invalid.
    pub async fn connect(config: ClusterConfig) -> Result<Self> {
        let client = ContainerClient::new().await.map_err(ClusterError::Connect)?;
        Self::new(Arc::new(client), config)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClusterState {
        self.state
    }

    /// How far the container itself got.
    pub fn container_stage(&self) -> LifecycleStage {
        self.lifecycle.stage()
    }

    /// ID of the cluster container, once created.
    pub fn container_id(&self) -> Option<&str> {
        self.lifecycle.container_id()
    }

    /// Configuration this cluster was built with.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// URL clients use to reach the API server.
    pub fn server_url(&self) -> String {
        env::server_url(self.config.port)
    }

    /// Provision the cluster and return client credentials.
    ///
    /// Only valid on an unstarted cluster. `cancel` aborts the kubeconfig wait
    /// with an error; if it fires during the final port wait, the credentials are
    /// still returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error. The cluster is then
    /// [`ClusterState::Failed`] and whatever container was created is left in place.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<CredentialBundle> {
        if self.state != ClusterState::Unstarted {
            return Err(ClusterError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        self.state = ClusterState::Starting;
        match self.run_start(cancel).await {
            Ok(credentials) => {
                self.state = ClusterState::Running;
                info!(server = %self.server_url(), "cluster is running");
                Ok(credentials)
            }
            Err(e) => {
                self.state = ClusterState::Failed;
                error!(stage = %self.lifecycle.stage(), "cluster start failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_start(&mut self, cancel: &CancellationToken) -> Result<CredentialBundle> {
        let image = self.config.image.as_str();
        let pulled = if self.config.always_pull {
            self.images.pull(image).await
        } else {
            self.images.ensure(image).await
        };
        pulled.map_err(ClusterError::Pull)?;

        let id = self
            .lifecycle
            .create(image, self.config.port, self.config.container_name())
            .await
            .map_err(ClusterError::Create)?;
        self.lifecycle.start().await.map_err(ClusterError::Start)?;

        let path = self.config.kubeconfig_path.as_str();
        self.prober.wait_for_artifact(&id, path, cancel).await?;

        let credentials = self.extractor.extract(&id, path).await?;

        match self
            .prober
            .wait_for_port(env::LOCALHOST, self.config.port, cancel)
            .await
        {
            PortReadiness::Ready => {}
            PortReadiness::Cancelled => {
                warn!("Cancelled before the API server port accepted connections");
            }
        }

        Ok(credentials)
    }

    /// Stop and remove the cluster container.
    ///
    /// Runs whether or not `start` completed, as long as a container was
    /// created; without one it only marks the cluster stopped. The removal is
    /// skipped when the stop fails.
    ///
    /// # Errors
    ///
    /// Returns error if the cluster is already stopping, or the stop or removal fails.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state == ClusterState::Stopping {
            return Err(ClusterError::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }

        if self.lifecycle.container_id().is_none() {
            self.state = ClusterState::Stopped;
            return Ok(());
        }

        info!("shutting down");
        let previous = self.state;
        self.state = ClusterState::Stopping;

        if let Err(e) = self.lifecycle.stop().await {
            self.state = previous;
            return Err(ClusterError::Stop(e));
        }
        if let Err(e) = self.lifecycle.remove().await {
            self.state = previous;
            return Err(ClusterError::Remove(e));
        }

        self.state = ClusterState::Stopped;
        Ok(())
    }

    /// Tear down whatever a failed or cancelled `start` left behind.
    ///
    /// Only the lifecycle steps that actually happened are undone.
    ///
    /// # Errors
    ///
    /// Returns error if the container cannot be removed.
    pub async fn cleanup(&mut self) -> Result<()> {
        self.lifecycle
            .cleanup()
            .await
            .map_err(ClusterError::Cleanup)?;
        self.state = ClusterState::Stopped;
        Ok(())
    }

    /// Ask the runtime for the cluster container's state.
    ///
    /// # Errors
    ///
    /// Returns error if no container was created or it no longer exists.
    pub async fn inspect(&self) -> Result<ContainerState> {
        self.lifecycle.inspect().await.map_err(ClusterError::Inspect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_chain_names_stage() {
        let err = ClusterError::Credentials(CredentialError::MissingUser);
        assert_eq!(err.to_string(), "Extracting credentials failed");
        assert_eq!(
            err.source().unwrap().to_string(),
            "Kubeconfig contains no user entries"
        );

        let err = ClusterError::Pull(ContainerError::PullFailed {
            image: "rancher/k3s:nope".to_string(),
            message: "manifest unknown".to_string(),
        });
        assert!(err.source().unwrap().to_string().contains("manifest unknown"));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ClusterState::Unstarted.to_string(), "unstarted");
        assert_eq!(ClusterState::Failed.to_string(), "failed");
    }
}
