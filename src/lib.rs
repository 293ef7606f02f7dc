//! # k3t
//!
//! Ephemeral single-node k3s clusters for integration tests. k3t runs a k3s
//! server in a privileged Docker/Podman container, publishes its API server on
//! a loopback port, and hands back the client credentials needed to talk to it.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: runtime client, image pulls and container lifecycle
//! - **[`readiness`]**: polling for the kubeconfig file and the API server port
//! - **[`credentials`]**: copying the kubeconfig out and decoding its secrets
//! - **[`cluster`]**: the [`Cluster`] facade that sequences all of the above
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use k3t::{Cluster, ClusterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut cluster = Cluster::connect(ClusterConfig::with_port(7443)).await?;
//!
//!     let credentials = match cluster.start(&CancellationToken::new()).await {
//!         Ok(credentials) => credentials,
//!         Err(e) => {
//!             cluster.cleanup().await?;
//!             return Err(e.into());
//!         }
//!     };
//!
//!     // Talk to https://127.0.0.1:7443 with `credentials` ...
//!     println!("{:?}", credentials);
//!
//!     cluster.stop().await?;
//!     Ok(())
//! }
//! ```

/// Container runtime access.
///
/// The [`container::ContainerRuntime`] trait, its Docker/Podman implementation,
/// image pulls and the lifecycle of the cluster container.
pub mod container;

/// Readiness polling for the kubeconfig artifact and the API server port.
pub mod readiness;

/// Kubeconfig retrieval and credential decoding.
pub mod credentials;

/// The cluster lifecycle facade and its configuration.
pub mod cluster;

/// Environment constants and path utilities.
///
/// Centralizes image references, in-container paths, environment variable
/// names and config file locations.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use cluster::{Cluster, ClusterConfig, ClusterError, ClusterState};
pub use container::{ContainerClient, ContainerError, ContainerRuntime};
pub use credentials::{CredentialBundle, CredentialError};
pub use readiness::{PollPolicy, PortReadiness, ReadinessError};
