//! Image pulls.
//!
//! [`ImageProvisioner`] makes sure the cluster image is in the local image cache,
//! consuming the runtime's pull progress feed and logging each event.

use crate::container::{ContainerError, ContainerRuntime, Result};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Byte-level progress of one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetail {
    #[serde(default)]
    pub current: i64,
    #[serde(default)]
    pub total: i64,
}

/// One decoded line of the image pull progress feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullProgressEvent {
    /// Layer or operation id
    #[serde(default)]
    pub id: String,
    /// Status text (`Downloading`, `Pull complete`, `Digest: sha256:...`)
    #[serde(default)]
    pub status: String,
    /// Error reported by the runtime for this pull
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Human-readable progress bar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, rename = "progressDetail")]
    pub progress_detail: ProgressDetail,
}

impl From<bollard::models::CreateImageInfo> for PullProgressEvent {
    fn from(info: bollard::models::CreateImageInfo) -> Self {
        let error = info
            .error
            .or_else(|| info.error_detail.and_then(|detail| detail.message));
        let progress_detail = info
            .progress_detail
            .map(|detail| ProgressDetail {
                current: detail.current.unwrap_or_default(),
                total: detail.total.unwrap_or_default(),
            })
            .unwrap_or_default();

        Self {
            id: info.id.unwrap_or_default(),
            status: info.status.unwrap_or_default(),
            error,
            progress: info.progress,
            progress_detail,
        }
    }
}

/// How a pull event is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullEventKind {
    /// One of the two closing `Digest:`/`Status:` lines
    Summary,
    /// A layer finished downloading and extracting
    LayerComplete,
    /// Intermediate progress
    Progress,
    /// The runtime reported a failure
    Failed,
}

impl PullProgressEvent {
    /// Classify the event.
    pub fn kind(&self) -> PullEventKind {
        if self.error.as_deref().is_some_and(|e| !e.is_empty()) {
            PullEventKind::Failed
        } else if self.status.starts_with("Digest:") || self.status.starts_with("Status:") {
            PullEventKind::Summary
        } else if self.status == "Pull complete" {
            PullEventKind::LayerComplete
        } else {
            PullEventKind::Progress
        }
    }
}

/// Pulls images through a [`ContainerRuntime`].
pub struct ImageProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ImageProvisioner {
    /// Create a new image provisioner.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Pull an image, consuming the progress feed until it ends.
    ///
    /// # Errors
    ///
    /// Returns error if the pull cannot be started, the feed breaks or
    /// cannot be decoded, or an event reports a failure.
    pub async fn pull(&self, image: &str) -> Result<()> {
        info!(image, "Pulling image");

        let mut stream = self.runtime.pull_image(image);
        let mut layers = 0usize;

        while let Some(event) = stream.next().await {
            let event = event?;
            match event.kind() {
                PullEventKind::Summary => {
                    info!(status = %event.status, "image pull update");
                }
                PullEventKind::LayerComplete => {
                    layers += 1;
                    info!(id = %event.id, status = %event.status, "image pull completed");
                }
                PullEventKind::Progress => {
                    debug!(
                        id = %event.id,
                        status = %event.status,
                        progress = event.progress.as_deref().unwrap_or_default(),
                        "image pull"
                    );
                }
                PullEventKind::Failed => {
                    return Err(ContainerError::PullFailed {
                        image: image.to_string(),
                        message: event.error.unwrap_or_default(),
                    });
                }
            }
        }

        info!(image, layers, "Successfully pulled image");
        Ok(())
    }

    /// Pull an image only if it is not already present locally.
    ///
    /// # Errors
    ///
    /// Returns error if the existence check or the pull fails.
    pub async fn ensure(&self, image: &str) -> Result<()> {
        if self.runtime.image_exists(image).await? {
            debug!(image, "Image already exists locally");
            return Ok(());
        }
        self.pull(image).await
    }
}
