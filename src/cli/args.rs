//! Command line argument parsing
//!
//! Subcommands:
//! - `up`: Start a cluster, print its credentials and stop it on Ctrl-C
//! - `show-config`: Print the effective configuration as TOML

use crate::cluster::ClusterConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Up(UpConfig),
    ShowConfig { config_override: Option<PathBuf> },
}

/// Everything `k3t up` was asked to do.
#[derive(Debug, Default)]
pub struct UpConfig {
    pub config_override: Option<PathBuf>,
    pub port: Option<u16>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub kubeconfig: Option<PathBuf>,
    pub json: bool,
    pub verbose: bool,
}

impl UpConfig {
    /// Apply command line overrides on top of a file or default configuration.
    pub fn apply(&self, mut config: ClusterConfig) -> ClusterConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(image) = &self.image {
            config.image = image.clone();
        }
        if let Some(name) = &self.name {
            config.container_name = Some(name.clone());
        }
        config
    }
}

#[derive(Debug, Parser)]
#[command(name = "k3t")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run an ephemeral single-node k3s cluster for integration tests")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a cluster and keep it running until Ctrl-C
    Up {
        /// Host port for the API server (loopback only)
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
        /// k3s image reference
        #[arg(long = "image")]
        image: Option<String>,
        /// Container name
        #[arg(long = "name")]
        name: Option<String>,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Write ca.crt, client.crt and client.key into this directory
        #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Write a kubeconfig for the published port to this file
        #[arg(long = "kubeconfig", value_name = "FILE")]
        kubeconfig: Option<PathBuf>,
        /// Print credentials as JSON
        #[arg(long = "json")]
        json: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Print the effective configuration
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Up {
                port,
                image,
                name,
                config,
                output_dir,
                kubeconfig,
                json,
                verbose,
            }) => {
                if *port == Some(0) {
                    return Err("--port must be non-zero".to_string());
                }

                Ok(ExecutionMode::Up(UpConfig {
                    config_override: config.clone(),
                    port: *port,
                    image: image.clone(),
                    name: name.clone(),
                    output_dir: output_dir.clone(),
                    kubeconfig: kubeconfig.clone(),
                    json: *json,
                    verbose: *verbose,
                }))
            }
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            None => {
                Err("No command specified. Use 'k3t --help' to see available commands.".to_string())
            }
        }
    }
}
