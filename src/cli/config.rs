//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Explicit `--config` path
//! 2. Current directory: ./k3t.toml or ./.k3t/config.toml
//! 3. User config: ~/.k3t/config.toml
//! 4. Built-in defaults

use crate::cluster::ClusterConfig;
use crate::env;
use anyhow::{Context, Result};
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the explicit config file if given, otherwise discover one.
    pub fn load(config_override: Option<&Path>) -> Result<ClusterConfig> {
        match config_override {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                ClusterConfig::from_toml_file(path)
                    .with_context(|| format!("Loading configuration from {}", path.display()))
            }
            None => Self::discover_config(),
        }
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<ClusterConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ClusterConfig::from_toml_file(&config_path)
                .with_context(|| format!("Loading configuration from {}", config_path.display()));
        }

        info!("No configuration file found, using defaults");
        Ok(ClusterConfig::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::candidates_for(current_dir.as_deref(), home_dir.as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_candidate_order() {
        let candidates =
            ConfigDiscovery::candidates_for(Some(Path::new("/work")), Some(Path::new("/home/me")));

        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/work/k3t.toml"),
                PathBuf::from("/work/.k3t/config.toml"),
                PathBuf::from("/home/me/.k3t/config.toml"),
            ]
        );
    }

    #[test]
    fn test_local_file_wins_over_user_file() {
        let work = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();

        let user_path = env::user_config_file_path(home.path());
        std::fs::create_dir_all(user_path.parent().unwrap()).unwrap();
        ClusterConfig::with_port(8443).to_toml_file(&user_path).unwrap();

        let candidates = ConfigDiscovery::candidates_for(Some(work.path()), Some(home.path()));
        assert_eq!(
            ConfigDiscovery::first_existing(candidates.clone()),
            Some(user_path)
        );

        let local_path = work.path().join(env::LOCAL_CONFIG_FILE_NAME);
        ClusterConfig::with_port(9443).to_toml_file(&local_path).unwrap();
        assert_eq!(ConfigDiscovery::first_existing(candidates), Some(local_path));
    }

    #[test]
    fn test_load_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "port = 10443\n").unwrap();

        let config = ConfigDiscovery::load(Some(&path)).unwrap();
        assert_eq!(config.port, 10443);

        let missing = dir.path().join("missing.toml");
        assert!(ConfigDiscovery::load(Some(&missing)).is_err());
    }
}
