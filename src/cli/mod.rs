//! CLI-specific functionality for k3t
//!
//! This module contains argument parsing, configuration discovery and
//! credential output formatting.

pub mod args;
pub mod config;
pub mod output;

pub use args::{Args, ExecutionMode, UpConfig};
pub use config::ConfigDiscovery;
pub use output::CredentialOutput;
