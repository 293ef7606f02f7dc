//! Container runtime layer.
//!
//! This module drives the Docker/Podman control plane via the bollard API. It
//! handles image pulls, the lifecycle of the single cluster container, and the
//! file-level access (stat and copy) the readiness and credential stages need.
//!
//! ## Architecture
//!
//! - [`runtime`]: the [`ContainerRuntime`] trait every other stage talks to
//! - [`client`]: bollard-backed implementation of [`ContainerRuntime`]
//! - [`config`]: container configuration builders
//! - [`image`]: image pulls and progress-event classification
//! - [`lifecycle`]: create/start/stop/remove of the cluster container
//!
//! ## Usage
//!
//! ```rust,no_run
//! use k3t::container::{ContainerClient, ContainerLifecycleManager, ImageProvisioner};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Arc::new(ContainerClient::new().await?);
//!
//!     ImageProvisioner::new(runtime.clone())
//!         .pull("rancher/k3s:v1.21.1-k3s1")
//!         .await?;
//!
//!     let mut lifecycle = ContainerLifecycleManager::new(runtime);
//!     lifecycle
//!         .create("rancher/k3s:v1.21.1-k3s1", 7443, None)
//!         .await?;
//!     lifecycle.start().await?;
//!
//!     // ...
//!
//!     lifecycle.stop().await?;
//!     lifecycle.remove().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod image;
pub mod lifecycle;
pub mod runtime;

pub use client::{ContainerClient, ContainerClientConfig};
pub use config::{ContainerConfig, ContainerConfigBuilder};
pub use image::{ImageProvisioner, ProgressDetail, PullEventKind, PullProgressEvent};
pub use lifecycle::{ContainerLifecycleManager, LifecycleStage};
pub use runtime::{ContainerRuntime, ContainerState, PathStat, PullEventStream};

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    /// Image or path not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The container itself no longer exists
    #[error("Container {0} no longer exists")]
    ContainerGone(String),

    /// Container configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The pull event stream reported an error
    #[error("Pull of {image} failed: {message}")]
    PullFailed { image: String, message: String },

    /// Operation not valid in the container's current lifecycle stage
    #[error("Cannot {operation} container in stage {stage}")]
    InvalidState {
        operation: &'static str,
        stage: LifecycleStage,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// General error
    #[error("Container error: {0}")]
    Other(String),
}

impl ContainerError {
    /// Whether the runtime reported the target (container, image or path) as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContainerError::NotFound(_)
                | ContainerError::ContainerGone(_)
                | ContainerError::ApiError(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                })
        )
    }

    /// Whether the container an operation targeted is missing, as opposed to a
    /// file or image inside or behind it.
    pub fn is_container_gone(&self) -> bool {
        match self {
            ContainerError::ContainerGone(_) => true,
            ContainerError::ApiError(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            }) => names_missing_container(message),
            _ => false,
        }
    }

    /// Map a bollard error for a request against `target`. HTTP 404 becomes
    /// [`ContainerError::ContainerGone`] when the daemon says the container is
    /// missing and [`ContainerError::NotFound`] otherwise.
    pub(crate) fn from_api(err: bollard::errors::Error, target: &str) -> Self {
        Self::from_archive_api(err, target, target)
    }

    /// Like [`ContainerError::from_api`] for requests that address a path inside
    /// `container_id`.
    pub(crate) fn from_archive_api(
        err: bollard::errors::Error,
        container_id: &str,
        target: &str,
    ) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } if names_missing_container(&message) => {
                ContainerError::ContainerGone(container_id.to_string())
            }
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => ContainerError::NotFound(target.to_string()),
            e => ContainerError::ApiError(e),
        }
    }
}

/// Docker answers "No such container: <id>", Podman "no container with name or
/// ID ... found: no such container".
fn names_missing_container(message: &str) -> bool {
    message.to_ascii_lowercase().contains("no such container")
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(ContainerError::NotFound("abc".to_string()).is_not_found());

        let api_404 = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: abc".to_string(),
        };
        assert!(ContainerError::ApiError(api_404).is_not_found());

        let api_500 = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(!ContainerError::ApiError(api_500).is_not_found());
        assert!(!ContainerError::Other("denied".to_string()).is_not_found());
    }

    #[test]
    fn test_from_api_maps_404() {
        let err = ContainerError::from_api(
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message: "Could not find the file".to_string(),
            },
            "/output/kubeconfig.yaml",
        );
        assert!(matches!(err, ContainerError::NotFound(ref p) if p == "/output/kubeconfig.yaml"));

        let err = ContainerError::from_api(
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message: "Conflict".to_string(),
            },
            "k3t",
        );
        assert!(matches!(err, ContainerError::ApiError(_)));
    }

    #[test]
    fn test_archive_404_distinguishes_container_from_path() {
        let err = ContainerError::from_archive_api(
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message: "No such container: 4f1c2a".to_string(),
            },
            "4f1c2a",
            "4f1c2a:/output/kubeconfig.yaml",
        );
        assert!(matches!(err, ContainerError::ContainerGone(ref id) if id == "4f1c2a"));
        assert!(err.is_container_gone());
        assert!(err.is_not_found());

        let err = ContainerError::from_archive_api(
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message: "Could not find the file /output/kubeconfig.yaml in container 4f1c2a"
                    .to_string(),
            },
            "4f1c2a",
            "4f1c2a:/output/kubeconfig.yaml",
        );
        assert!(matches!(err, ContainerError::NotFound(_)));
        assert!(!err.is_container_gone());

        let podman = ContainerError::from_api(
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message: "no container with name or ID \"k3t\" found: no such container"
                    .to_string(),
            },
            "k3t",
        );
        assert!(podman.is_container_gone());
    }
}
