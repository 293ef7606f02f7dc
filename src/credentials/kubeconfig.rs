//! The kubeconfig document written by the k3s server.

use super::{CredentialBundle, CredentialError, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

// Field names as they appear in the document; errors report them verbatim.
pub const CERTIFICATE_AUTHORITY_DATA: &str = "certificate-authority-data";
pub const CLIENT_CERTIFICATE_DATA: &str = "client-certificate-data";
pub const CLIENT_KEY_DATA: &str = "client-key-data";

const DEFAULT_NAME: &str = "default";

/// Parsed kubeconfig.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfigDocument {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context", default)]
    pub current_context: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCluster {
    #[serde(default)]
    pub cluster: ClusterEntry,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    #[serde(rename = "certificate-authority-data", default)]
    pub certificate_authority_data: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    #[serde(default)]
    pub context: ContextEntry,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
}

/// Always empty in k3s output; kept so re-serialized documents match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: UserEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    #[serde(rename = "client-certificate-data", default)]
    pub client_certificate_data: String,
    #[serde(rename = "client-key-data", default)]
    pub client_key_data: String,
}

impl ClusterConfigDocument {
    /// Deserialize a kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns error if `data` is not a YAML document of the expected shape.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(data)?)
    }

    /// Serialize back to YAML.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// A document with one cluster, user and context, all named `default`.
    pub fn single(server: &str, ca: &[u8], client_certificate: &[u8], client_key: &[u8]) -> Self {
        Self {
            api_version: "v1".to_string(),
            clusters: vec![NamedCluster {
                cluster: ClusterEntry {
                    certificate_authority_data: STANDARD.encode(ca),
                    server: server.to_string(),
                },
                name: DEFAULT_NAME.to_string(),
            }],
            contexts: vec![NamedContext {
                context: ContextEntry {
                    cluster: DEFAULT_NAME.to_string(),
                    user: DEFAULT_NAME.to_string(),
                },
                name: DEFAULT_NAME.to_string(),
            }],
            current_context: DEFAULT_NAME.to_string(),
            kind: "Config".to_string(),
            preferences: Preferences {},
            users: vec![NamedUser {
                name: DEFAULT_NAME.to_string(),
                user: UserEntry {
                    client_certificate_data: STANDARD.encode(client_certificate),
                    client_key_data: STANDARD.encode(client_key),
                },
            }],
        }
    }

    /// Decode the credentials of the first cluster and first user.
    ///
    /// # Errors
    ///
    /// Returns error if there is no cluster or no user entry, or a credential
    /// field is not base64 or is empty. Errors name the offending field.
    pub fn credentials(&self) -> Result<CredentialBundle> {
        let cluster = self.clusters.first().ok_or(CredentialError::MissingCluster)?;
        let user = self.users.first().ok_or(CredentialError::MissingUser)?;

        Ok(CredentialBundle {
            certificate_authority: decode_field(
                CERTIFICATE_AUTHORITY_DATA,
                &cluster.cluster.certificate_authority_data,
            )?,
            client_certificate: decode_field(
                CLIENT_CERTIFICATE_DATA,
                &user.user.client_certificate_data,
            )?,
            client_key: decode_field(CLIENT_KEY_DATA, &user.user.client_key_data)?,
        })
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|source| CredentialError::Base64 { field, source })?;
    if bytes.is_empty() {
        return Err(CredentialError::EmptyField { field });
    }
    Ok(bytes)
}

/// Parse a kubeconfig and extract its credentials.
///
/// # Errors
///
/// See [`ClusterConfigDocument::from_slice`] and [`ClusterConfigDocument::credentials`].
pub fn parse(data: &[u8]) -> Result<CredentialBundle> {
    ClusterConfigDocument::from_slice(data)?.credentials()
}
