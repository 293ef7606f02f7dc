//! Client credential extraction.
//!
//! The k3s server writes a kubeconfig inside its container. This module copies
//! that file out ([`CredentialExtractor::fetch`]), checks the archive it arrives
//! in ([`archive`]), and decodes the three secrets a client needs from it
//! ([`kubeconfig::parse`]).

pub mod archive;
pub mod kubeconfig;

pub use kubeconfig::{ClusterConfigDocument, parse};

use crate::container::{ContainerError, ContainerRuntime};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Credential extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Copying the file out of the container failed
    #[error("Copying {path} from container failed: {source}")]
    Copy {
        path: String,
        #[source]
        source: ContainerError,
    },

    /// The archive could not be read
    #[error("Error reading kubeconfig archive: {0}")]
    Archive(#[from] std::io::Error),

    /// The archive held no entries
    #[error("Expected archive to contain {expected}, but it was empty")]
    EmptyArchive { expected: String },

    /// The single entry had the wrong name
    #[error("Expected archive to contain a file named {expected}, found {found}")]
    UnexpectedEntry { expected: String, found: String },

    /// More than one entry
    #[error("Expected archive to only contain {expected}")]
    ExtraEntries { expected: String },

    /// The kubeconfig is not valid YAML for the expected shape
    #[error("Error unmarshalling kubeconfig: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No cluster entries
    #[error("Kubeconfig contains no cluster entries")]
    MissingCluster,

    /// No user entries
    #[error("Kubeconfig contains no user entries")]
    MissingUser,

    /// A credential field is not valid base64
    #[error("Error decoding {field}: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    /// A credential field decoded to nothing
    #[error("Kubeconfig field {field} is empty")]
    EmptyField { field: &'static str },
}

/// Result type for credential operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Decoded secrets needed to authenticate to the cluster.
///
/// All three fields are raw bytes (PEM text for k3s) and non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Cluster certificate authority
    pub certificate_authority: Vec<u8>,
    /// Client certificate
    pub client_certificate: Vec<u8>,
    /// Client private key
    pub client_key: Vec<u8>,
}

// Keep the private key out of logs.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field(
                "certificate_authority",
                &format_args!("<{} bytes>", self.certificate_authority.len()),
            )
            .field(
                "client_certificate",
                &format_args!("<{} bytes>", self.client_certificate.len()),
            )
            .field("client_key", &format_args!("<{} bytes>", self.client_key.len()))
            .finish()
    }
}

/// CA file written by [`CredentialBundle::write_to_dir`]
pub const CA_FILE_NAME: &str = "ca.crt";
/// Client certificate file written by [`CredentialBundle::write_to_dir`]
pub const CLIENT_CERT_FILE_NAME: &str = "client.crt";
/// Client key file written by [`CredentialBundle::write_to_dir`]
pub const CLIENT_KEY_FILE_NAME: &str = "client.key";

impl CredentialBundle {
    /// Build a kubeconfig that reaches the cluster at `server` with these credentials.
    pub fn to_kubeconfig(&self, server: &str) -> ClusterConfigDocument {
        ClusterConfigDocument::single(
            server,
            &self.certificate_authority,
            &self.client_certificate,
            &self.client_key,
        )
    }

    /// Write the CA, client certificate and client key into `dir`.
    ///
    /// The key is written with mode `0600` on Unix.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or a file cannot be written.
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(CA_FILE_NAME), &self.certificate_authority)?;
        std::fs::write(dir.join(CLIENT_CERT_FILE_NAME), &self.client_certificate)?;

        let key_path = dir.join(CLIENT_KEY_FILE_NAME);
        std::fs::write(&key_path, &self.client_key)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Copies the kubeconfig out of the cluster container.
pub struct CredentialExtractor {
    runtime: Arc<dyn ContainerRuntime>,
}

impl CredentialExtractor {
    /// Create a new credential extractor.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Copy `path` out of the container and return the file's contents.
    ///
    /// # Errors
    ///
    /// Returns error if the copy fails or the archive does not contain exactly one
    /// entry named after the base name of `path`.
    pub async fn fetch(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        let expected = archive::entry_name(path);

        let raw = self
            .runtime
            .copy_from_container(container_id, path)
            .await
            .map_err(|source| CredentialError::Copy {
                path: path.to_string(),
                source,
            })?;
        debug!(container_id, path, archive_bytes = raw.len(), "Copied archive");

        let data = archive::read_single_file(&raw, &expected)?;
        info!(container_id, path, bytes = data.len(), "Fetched kubeconfig");
        Ok(data)
    }

    /// Fetch and parse the kubeconfig in one step.
    ///
    /// # Errors
    ///
    /// Returns any error from [`fetch`](Self::fetch) or [`parse`].
    pub async fn extract(&self, container_id: &str, path: &str) -> Result<CredentialBundle> {
        let data = self.fetch(container_id, path).await?;
        parse(&data)
    }
}
