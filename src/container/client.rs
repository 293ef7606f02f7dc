//! Docker/Podman client wrapper.
//!
//! Provides the bollard-backed [`ContainerRuntime`] implementation with automatic
//! connection handling and fallback to Podman sockets.

use crate::container::{
    ContainerConfig, ContainerError, ContainerRuntime, ContainerState, PathStat, PullEventStream,
    PullProgressEvent, Result,
};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, DownloadFromContainerOptionsBuilder,
    InspectContainerOptions, RemoveContainerOptionsBuilder, StartContainerOptions,
    StopContainerOptionsBuilder,
};
use futures::stream::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Request timeout in seconds for socket connections
    pub timeout: u64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self { timeout: 120 }
    }
}

/// Docker/Podman API client wrapper.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
}

impl ContainerClient {
    /// Create a new container client with default configuration.
    ///
    /// Attempts to connect to Docker first, then falls back to Podman if available.
    ///
    /// # Errors
    ///
    /// Returns error if neither Docker nor Podman are available or connection fails.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerClientConfig::default()).await
    }

    /// Create a new container client with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if connection to container runtime fails.
    pub async fn with_config(config: ContainerClientConfig) -> Result<Self> {
        let docker = Self::connect(&config)?;

        let client = Self {
            docker: Arc::new(docker),
        };

        // Verify connection works
        client.ping().await?;

        Ok(client)
    }

    /// Connect to Docker or Podman daemon.
    ///
    /// Tries multiple connection strategies in order:
    /// 1. Local defaults (`DOCKER_HOST`, Unix socket or Windows named pipe)
    /// 2. Rootless Podman socket
    /// 3. System Podman socket
    fn connect(config: &ContainerClientConfig) -> Result<Docker> {
        debug!("Attempting to connect to container runtime...");

        match Docker::connect_with_defaults() {
            Ok(docker) => {
                info!("Connected to container runtime via local defaults");
                return Ok(docker);
            }
            Err(e) => {
                debug!("Local defaults failed: {}", e);
            }
        }

        #[cfg(unix)]
        {
            let mut sockets = Vec::new();
            if let Ok(home) = std::env::var("HOME") {
                sockets.push(format!("unix://{}/run/podman/podman.sock", home));
            }
            sockets.push("unix:///run/podman/podman.sock".to_string());

            for socket in sockets {
                debug!("Trying Podman socket: {}", socket);
                match Docker::connect_with_socket(
                    &socket,
                    config.timeout,
                    bollard::API_DEFAULT_VERSION,
                ) {
                    Ok(docker) => {
                        info!("Connected to Podman via {}", socket);
                        return Ok(docker);
                    }
                    Err(e) => {
                        debug!("Podman socket {} failed: {}", socket, e);
                    }
                }
            }
        }

        Err(ContainerError::Other(
            "Failed to connect to Docker or Podman. Please ensure Docker or Podman is installed and running.".to_string()
        ))
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::Other(format!("Failed to ping container runtime: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for ContainerClient {
    fn pull_image<'a>(&'a self, image: &'a str) -> PullEventStream<'a> {
        self.docker
            .create_image(
                Some(CreateImageOptionsBuilder::new().from_image(image).build()),
                None,
                None,
            )
            .map(move |result| {
                result
                    .map(PullProgressEvent::from)
                    .map_err(|e| ContainerError::from_api(e, image))
            })
            .boxed()
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ContainerError::ApiError(e)),
        }
    }

    async fn create_container(
        &self,
        name: Option<&str>,
        config: &ContainerConfig,
    ) -> Result<String> {
        let options = name.map(|name| CreateContainerOptionsBuilder::new().name(name).build());

        let body = ContainerCreateBody {
            image: Some(config.image.clone()),
            cmd: config.cmd.clone(),
            env: config.env.clone(),
            labels: config.labels.clone(),
            exposed_ports: config.exposed_ports_map(),
            host_config: Some(config.host_config.clone()),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(options, body)
            .await
            .map_err(|e| ContainerError::from_api(e, &config.image))?;

        for warning in &response.warnings {
            debug!(container_id = %response.id, "Create warning: {}", warning);
        }

        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions>)
            .await
            .map_err(|e| ContainerError::from_api(e, container_id))
    }

    async fn stop_container(&self, container_id: &str, timeout_secs: Option<i64>) -> Result<()> {
        let options = timeout_secs.map(|t| {
            StopContainerOptionsBuilder::new()
                .t(i32::try_from(t).unwrap_or(i32::MAX))
                .build()
        });
        self.docker
            .stop_container(container_id, options)
            .await
            .map_err(|e| ContainerError::from_api(e, container_id))
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                container_id,
                // v: remove anonymous volumes
                Some(RemoveContainerOptionsBuilder::new().force(force).v(true).build()),
            )
            .await
            .map_err(|e| ContainerError::from_api(e, container_id))
    }

    async fn inspect_container(&self, container_id: &str) -> Result<ContainerState> {
        let inspect = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| ContainerError::from_api(e, container_id))?;

        let state = inspect.state.ok_or_else(|| {
            ContainerError::Other(format!("Container {} has no state", container_id))
        })?;

        if state.running.unwrap_or(false) {
            Ok(ContainerState::Running)
        } else if state.paused.unwrap_or(false) {
            Ok(ContainerState::Paused)
        } else if state.restarting.unwrap_or(false) {
            Ok(ContainerState::Restarting)
        } else if state.dead.unwrap_or(false) {
            Ok(ContainerState::Dead)
        } else if state.status == Some(bollard::models::ContainerStateStatusEnum::CREATED) {
            Ok(ContainerState::Created)
        } else {
            Ok(ContainerState::Stopped)
        }
    }

    /// bollard has no call for the archive `HEAD` request, so the stat is taken
    /// from the first header of the downloaded archive.
    async fn stat_path(&self, container_id: &str, path: &str) -> Result<PathStat> {
        let archive = self.copy_from_container(container_id, path).await?;
        let mut archive = tar::Archive::new(archive.as_slice());
        let entry = archive
            .entries()?
            .next()
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))??;

        let name = entry
            .path()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let header = entry.header();

        Ok(PathStat {
            name,
            size: header.size()?,
            mode: header.mode()?,
        })
    }

    async fn copy_from_container(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        debug!(container_id, path, "Copying path out of container");

        let mut stream = self.docker.download_from_container(
            container_id,
            Some(DownloadFromContainerOptionsBuilder::new().path(path).build()),
        );

        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                let target = format!("{}:{}", container_id, path);
                ContainerError::from_archive_api(e, container_id, &target)
            })?;
            archive.extend_from_slice(&chunk);
        }

        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Docker/Podman to be running
    async fn test_client_connection() {
        let client = ContainerClient::new().await.unwrap();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_missing_container_is_not_found() {
        let client = ContainerClient::new().await.unwrap();
        let err = client
            .inspect_container("k3t-does-not-exist")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.is_container_gone());

        let err = client
            .stat_path("k3t-does-not-exist", crate::env::server::KUBECONFIG_PATH)
            .await
            .unwrap_err();
        assert!(err.is_container_gone());
    }
}
