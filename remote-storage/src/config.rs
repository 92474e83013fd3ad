//! Configuration for the remote storage server.
//!
//! Settings come from two places: command-line arguments (port and config
//! file path) and an optional YAML file holding everything else. Every field
//! in the file has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::storage::{InMemoryStorage, Storage};

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "remote-storage")]
#[command(about = "Prometheus remote read/write storage adapter")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "REMOTE_STORAGE_CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(short, long, default_value = "9201", env = "REMOTE_STORAGE_PORT")]
    pub port: u16,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Root configuration file structure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    /// Deadline for a single read or write request, in seconds.
    /// Defaults to 60 seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Largest accepted (compressed) request body. Defaults to 32 MiB.
    #[serde(default = "default_max_request_body_bytes")]
    pub max_request_body_bytes: usize,
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_request_body_bytes() -> usize {
    32 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            max_request_body_bytes: default_max_request_body_bytes(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Keep all series in process memory.
    #[default]
    InMemory,
}

impl StorageConfig {
    /// Builds the configured backend.
    pub fn create_storage(&self) -> Arc<dyn Storage> {
        match self {
            StorageConfig::InMemory => Arc::new(InMemoryStorage::new()),
        }
    }
}

/// Load configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_config(&contents)
}

/// Parse configuration from YAML text. Empty text yields the defaults.
pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
}
