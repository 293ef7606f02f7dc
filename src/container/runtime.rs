//! Control-plane client interface.
//!
//! Every stage of the cluster lifecycle talks to the container runtime through
//! [`ContainerRuntime`]. [`ContainerClient`](super::ContainerClient) implements it
//! over the Docker/Podman API; tests substitute an in-memory runtime.

use crate::container::{ContainerConfig, PullProgressEvent, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of decoded image pull events, ending when the pull finishes.
pub type PullEventStream<'a> = BoxStream<'a, Result<PullProgressEvent>>;

/// Metadata about a path inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStat {
    /// Base name of the path
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Unix permission bits
    pub mode: u32,
}

/// Container state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Container is created but was never started
    Created,
    /// Container is running
    Running,
    /// Container is paused
    Paused,
    /// Container is restarting
    Restarting,
    /// Container is stopped
    Stopped,
    /// Container is dead
    Dead,
}

/// Operations the cluster lifecycle needs from the container runtime.
///
/// Errors where the runtime reports a missing container, image or path must
/// satisfy [`ContainerError::is_not_found`](super::ContainerError::is_not_found).
/// A missing container must additionally satisfy
/// [`ContainerError::is_container_gone`](super::ContainerError::is_container_gone):
/// the readiness prober retries a missing path but gives up on a missing container.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start pulling `image` and stream its progress events.
    fn pull_image<'a>(&'a self, image: &'a str) -> PullEventStream<'a>;

    /// Check whether `image` is present in the local image cache.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Create a container, returning its ID. `name` of `None` lets the runtime pick one.
    async fn create_container(&self, name: Option<&str>, config: &ContainerConfig)
    -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Stop a running container. `timeout_secs` of `None` uses the runtime default.
    async fn stop_container(&self, container_id: &str, timeout_secs: Option<i64>) -> Result<()>;

    /// Remove a container. `force` also kills it if it is still running.
    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()>;

    /// Report the current state of a container.
    async fn inspect_container(&self, container_id: &str) -> Result<ContainerState>;

    /// Stat a path inside a container.
    async fn stat_path(&self, container_id: &str, path: &str) -> Result<PathStat>;

    /// Copy a path out of a container as a tar archive.
    async fn copy_from_container(&self, container_id: &str, path: &str) -> Result<Vec<u8>>;
}
