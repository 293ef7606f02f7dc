//! Lifecycle of the single cluster container.
//!
//! [`ContainerLifecycleManager`] owns the identity of one container from creation
//! to removal and records which lifecycle steps have actually happened, so that
//! teardown after a partial failure only undoes what exists.

use crate::container::{ContainerConfig, ContainerError, ContainerRuntime, ContainerState, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How far the managed container got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    /// No container exists (never created, or removed)
    Absent,
    /// Created but not started
    Created,
    /// Started
    Started,
    /// Stopped but not yet removed
    Stopped,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStage::Absent => write!(f, "absent"),
            LifecycleStage::Created => write!(f, "created"),
            LifecycleStage::Started => write!(f, "started"),
            LifecycleStage::Stopped => write!(f, "stopped"),
        }
    }
}

/// Creates, starts, stops and removes exactly one container.
pub struct ContainerLifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    container_id: Option<String>,
    /// Kept after removal so `inspect` can still ask the runtime about it
    last_container_id: Option<String>,
    stage: LifecycleStage,
    stop_timeout: Option<i64>,
}

impl ContainerLifecycleManager {
    /// Create a lifecycle manager with no container yet.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            container_id: None,
            last_container_id: None,
            stage: LifecycleStage::Absent,
            stop_timeout: None,
        }
    }

    /// Use an explicit graceful-stop timeout instead of the runtime default.
    pub fn with_stop_timeout(mut self, timeout_secs: Option<i64>) -> Self {
        self.stop_timeout = timeout_secs;
        self
    }

    /// ID of the managed container, once created.
    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    fn require(&self, operation: &'static str, allowed: &[LifecycleStage]) -> Result<&str> {
        match self.container_id.as_deref() {
            Some(id) if allowed.contains(&self.stage) => Ok(id),
            _ => Err(ContainerError::InvalidState {
                operation,
                stage: self.stage,
            }),
        }
    }

    /// Create the k3s server container from `image`, publishing the API server on
    /// `127.0.0.1:port`. A `name` of `None` lets the runtime assign one.
    ///
    /// # Errors
    ///
    /// Returns error if a container was already created by this manager, the
    /// configuration is invalid, or the runtime rejects the request (name
    /// collision, unknown image).
    pub async fn create(&mut self, image: &str, port: u16, name: Option<&str>) -> Result<String> {
        let config = ContainerConfig::cluster_server(image, port)?;
        self.create_with_config(name, &config).await
    }

    /// Create a container from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a container was already created or creation fails.
    pub async fn create_with_config(
        &mut self,
        name: Option<&str>,
        config: &ContainerConfig,
    ) -> Result<String> {
        if self.stage != LifecycleStage::Absent {
            return Err(ContainerError::InvalidState {
                operation: "create",
                stage: self.stage,
            });
        }

        debug!(image = %config.image, name = name.unwrap_or_default(), "Creating container");
        let id = self.runtime.create_container(name, config).await?;

        info!(id = %id, "container created successfully");
        self.container_id = Some(id.clone());
        self.last_container_id = Some(id.clone());
        self.stage = LifecycleStage::Created;
        Ok(id)
    }

    /// Start the created container.
    ///
    /// # Errors
    ///
    /// Returns error if the container is not in the created stage or start fails.
    pub async fn start(&mut self) -> Result<()> {
        let id = self.require("start", &[LifecycleStage::Created])?;

        debug!(id, "Starting container");
        self.runtime.start_container(id).await?;

        info!(id, "Started container");
        self.stage = LifecycleStage::Started;
        Ok(())
    }

    /// Gracefully stop the container.
    ///
    /// # Errors
    ///
    /// Returns error if no container exists or stop fails.
    pub async fn stop(&mut self) -> Result<()> {
        let id = self.require(
            "stop",
            &[
                LifecycleStage::Created,
                LifecycleStage::Started,
                LifecycleStage::Stopped,
            ],
        )?;

        debug!(id, "Stopping container");
        self.runtime.stop_container(id, self.stop_timeout).await?;

        info!(id, "Stopped container");
        self.stage = LifecycleStage::Stopped;
        Ok(())
    }

    /// Remove the container. Further lifecycle operations need a new `create`.
    ///
    /// # Errors
    ///
    /// Returns error if no container exists or removal fails.
    pub async fn remove(&mut self) -> Result<()> {
        let id = self.require(
            "remove",
            &[
                LifecycleStage::Created,
                LifecycleStage::Started,
                LifecycleStage::Stopped,
            ],
        )?;

        debug!(id, "Removing container");
        self.runtime.remove_container(id, false).await?;

        info!(id, "Removed container");
        self.container_id = None;
        self.stage = LifecycleStage::Absent;
        Ok(())
    }

    /// Best-effort teardown of whatever exists.
    ///
    /// A started container is stopped first; a failed stop is logged and the
    /// container is then force-removed. Nothing is done if no container exists.
    ///
    /// # Errors
    ///
    /// Returns error if the final removal fails.
    pub async fn cleanup(&mut self) -> Result<()> {
        let Some(id) = self.container_id.clone() else {
            debug!("No container to clean up");
            return Ok(());
        };

        if self.stage == LifecycleStage::Started {
            match self.runtime.stop_container(&id, self.stop_timeout).await {
                Ok(()) => self.stage = LifecycleStage::Stopped,
                Err(e) => warn!(id = %id, "Failed to stop container: {}", e),
            }
        }

        match self.runtime.remove_container(&id, true).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(id = %id, "Container already gone");
            }
            Err(e) => return Err(e),
        }

        info!(id = %id, "Cleaned up container");
        self.container_id = None;
        self.stage = LifecycleStage::Absent;
        Ok(())
    }

    /// Ask the runtime for the container's state.
    ///
    /// After removal the runtime is still asked about the last container, so a
    /// removed container yields a "not found" error.
    ///
    /// # Errors
    ///
    /// Returns error if no container was ever created or the runtime query fails.
    pub async fn inspect(&self) -> Result<ContainerState> {
        let id = self
            .container_id
            .as_deref()
            .or(self.last_container_id.as_deref())
            .ok_or(ContainerError::InvalidState {
                operation: "inspect",
                stage: self.stage,
            })?;
        self.runtime.inspect_container(id).await
    }
}
