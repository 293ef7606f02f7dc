//! Environment constants and path utilities for k3t.
//!
//! This module centralizes the hardcoded image references, in-container paths,
//! environment variable names and config file locations used throughout the crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Image used when no other image is configured
pub const DEFAULT_IMAGE: &str = "rancher/k3s:v1.21.1-k3s1";

/// Host port the API server is published on by default
pub const DEFAULT_HOST_PORT: u16 = 7443;

/// Loopback address the API server port is bound to
pub const LOCALHOST: &str = "127.0.0.1";

/// Application directory name (hidden directory like .git)
pub const K3T_DIR_NAME: &str = ".k3t";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "k3t.toml";

/// Label attached to every container created by k3t
pub const MANAGED_LABEL: &str = "k3t.managed";

/// Constants describing the k3s server process inside the container
pub mod server {
    /// Port the API server listens on inside the container
    pub const API_PORT: &str = "6443/tcp";

    /// Arguments passed to the k3s entrypoint
    pub const COMMAND: [&str; 2] = ["server", "--cluster-init"];

    /// Where the server writes its generated kubeconfig
    pub const KUBECONFIG_PATH: &str = "/output/kubeconfig.yaml";

    /// Env var telling k3s where to write the kubeconfig
    pub const KUBECONFIG_OUTPUT_ENV: &str = "K3S_KUBECONFIG_OUTPUT";

    /// Env var telling k3s which file mode to give the kubeconfig
    pub const KUBECONFIG_MODE_ENV: &str = "K3S_KUBECONFIG_MODE";

    /// World-readable mode for the kubeconfig
    pub const KUBECONFIG_MODE: &str = "666";
}

/// Polling defaults for the readiness probes
pub mod polling {
    use super::Duration;

    /// Interval between polling attempts
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// Maximum kubeconfig stat attempts before giving up
    pub const DEFAULT_ARTIFACT_MAX_ATTEMPTS: u32 = 300;
}

/// Build the `https://` URL of the API server published on the loopback interface
pub fn server_url(port: u16) -> String {
    format!("https://{}:{}", LOCALHOST, port)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(K3T_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(K3T_DIR_NAME).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_config_file_path(home_dir),
            Path::new("/home/user/.k3t/config.toml")
        );

        assert_eq!(
            local_config_file_path(current_dir),
            Path::new("/current/project/.k3t/config.toml")
        );
    }

    #[test]
    fn test_server_url() {
        assert_eq!(server_url(7443), "https://127.0.0.1:7443");
    }
}
