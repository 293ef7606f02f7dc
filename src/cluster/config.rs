//! Cluster configuration.

use crate::env;
use crate::readiness::PollPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything needed to provision one cluster.
///
/// Every field has a default, so a TOML file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// k3s image reference
    pub image: String,
    /// Host port the API server is published on (loopback only)
    pub port: u16,
    /// Container name; the runtime picks one when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Path of the kubeconfig inside the container
    pub kubeconfig_path: String,
    /// Delay between readiness polling attempts, in milliseconds
    pub poll_interval_ms: u64,
    /// Kubeconfig stat attempts before giving up
    pub artifact_max_attempts: u32,
    /// Graceful stop timeout; the runtime default applies when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout_secs: Option<i64>,
    /// Pull the image even if it is already present locally
    pub always_pull: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            image: env::DEFAULT_IMAGE.to_string(),
            port: env::DEFAULT_HOST_PORT,
            container_name: None,
            kubeconfig_path: env::server::KUBECONFIG_PATH.to_string(),
            poll_interval_ms: env::polling::DEFAULT_INTERVAL.as_millis() as u64,
            artifact_max_attempts: env::polling::DEFAULT_ARTIFACT_MAX_ATTEMPTS,
            stop_timeout_secs: None,
            always_pull: true,
        }
    }
}

impl ClusterConfig {
    /// Default configuration publishing the API server on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Polling policy for the readiness probes.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.artifact_max_attempts,
        }
    }

    /// Container name to request, treating an empty name as unset.
    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref().filter(|name| !name.is_empty())
    }

    /// Check values that would only fail later, against the runtime.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            anyhow::bail!("image must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("port must be non-zero");
        }
        if !self.kubeconfig_path.starts_with('/') {
            anyhow::bail!(
                "kubeconfig_path must be absolute, got {:?}",
                self.kubeconfig_path
            );
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be non-zero");
        }
        if self.artifact_max_attempts == 0 {
            anyhow::bail!("artifact_max_attempts must be non-zero");
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}
