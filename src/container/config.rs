//! Container configuration builders.
//!
//! Provides a fluent API for building container create requests, plus
//! [`ContainerConfig::cluster_server`] which describes the k3s server container.

use crate::container::{ContainerError, Result};
use crate::env;
use bollard::models::{HostConfig, PortBinding};
use std::collections::HashMap;

/// Container configuration builder.
///
/// Provides a fluent interface for constructing container configurations
/// with sane defaults and validation.
pub struct ContainerConfigBuilder {
    image: Option<String>,
    cmd: Option<Vec<String>>,
    env: Vec<String>,
    labels: HashMap<String, String>,
    exposed_ports: Vec<String>,
    port_bindings: HashMap<String, Option<Vec<PortBinding>>>,
    privileged: bool,
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerConfigBuilder {
    /// Create a new container configuration builder.
    pub fn new() -> Self {
        Self {
            image: None,
            cmd: None,
            env: Vec::new(),
            labels: HashMap::new(),
            exposed_ports: Vec::new(),
            port_bindings: HashMap::new(),
            privileged: false,
        }
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the command to run in the container.
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(|s| s.into()).collect());
        self
    }

    /// Add an environment variable.
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push(format!("{}={}", key.into(), value.into()));
        self
    }

    /// Add a label to the container.
    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Publish a container port (`port/protocol`) on `host_ip:host_port`.
    ///
    /// The port is also added to the container's exposed ports.
    pub fn port_binding<S, H>(mut self, container_port: S, host_ip: H, host_port: u16) -> Self
    where
        S: Into<String>,
        H: Into<String>,
    {
        let container_port = container_port.into();
        if !self.exposed_ports.contains(&container_port) {
            self.exposed_ports.push(container_port.clone());
        }
        self.port_bindings.insert(
            container_port,
            Some(vec![PortBinding {
                host_ip: Some(host_ip.into()),
                host_port: Some(host_port.to_string()),
            }]),
        );
        self
    }

    /// Run container in privileged mode.
    pub fn privileged(mut self, enable: bool) -> Self {
        self.privileged = enable;
        self
    }

    /// Build the container configuration.
    ///
    /// # Errors
    ///
    /// Returns error if required fields are missing or invalid.
    pub fn build(self) -> Result<ContainerConfig> {
        let image = self
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| ContainerError::ConfigError("Image is required".to_string()))?;

        for (port, bindings) in &self.port_bindings {
            let valid = bindings
                .iter()
                .flatten()
                .all(|b| b.host_port.as_deref() != Some("0"));
            if !valid {
                return Err(ContainerError::ConfigError(format!(
                    "Host port for {} must be non-zero",
                    port
                )));
            }
        }

        let host_config = HostConfig {
            port_bindings: if self.port_bindings.is_empty() {
                None
            } else {
                Some(self.port_bindings)
            },
            privileged: Some(self.privileged),
            ..Default::default()
        };

        Ok(ContainerConfig {
            image,
            cmd: self.cmd,
            env: if self.env.is_empty() {
                None
            } else {
                Some(self.env)
            },
            labels: if self.labels.is_empty() {
                None
            } else {
                Some(self.labels)
            },
            exposed_ports: self.exposed_ports,
            host_config,
        })
    }
}

/// Container configuration.
///
/// Holds container configuration for creation.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Image name
    pub image: String,
    /// Command to run
    pub cmd: Option<Vec<String>>,
    /// Environment variables
    pub env: Option<Vec<String>>,
    /// Labels
    pub labels: Option<HashMap<String, String>>,
    /// Exposed container ports (`port/protocol`)
    pub exposed_ports: Vec<String>,
    /// Host configuration
    pub host_config: HostConfig,
}

impl ContainerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::new()
    }

    /// Configuration for a single-node k3s server.
    ///
    /// The container runs privileged in cluster-init mode, publishes the API
    /// server port on `127.0.0.1:host_port` only, and writes a world-readable
    /// kubeconfig to [`env::server::KUBECONFIG_PATH`].
    ///
    /// # Errors
    ///
    /// Returns error if `image` is empty or `host_port` is zero.
    pub fn cluster_server(image: &str, host_port: u16) -> Result<Self> {
        Self::builder()
            .image(image)
            .cmd(env::server::COMMAND)
            .env(
                env::server::KUBECONFIG_OUTPUT_ENV,
                env::server::KUBECONFIG_PATH,
            )
            .env(env::server::KUBECONFIG_MODE_ENV, env::server::KUBECONFIG_MODE)
            .label(env::MANAGED_LABEL, "true")
            .port_binding(env::server::API_PORT, env::LOCALHOST, host_port)
            .privileged(true)
            .build()
    }

    /// Exposed ports in the shape the Docker API expects.
    pub fn exposed_ports_map(&self) -> Option<HashMap<String, HashMap<(), ()>>> {
        if self.exposed_ports.is_empty() {
            return None;
        }
        Some(
            self.exposed_ports
                .iter()
                .map(|port| (port.clone(), HashMap::new()))
                .collect(),
        )
    }
}
