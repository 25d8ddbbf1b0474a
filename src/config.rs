//! Configuration for the RAID-5 store
//!
//! Loaded from a TOML file, then overridden by environment variables and
//! finally by command-line flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Store and server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Total shard directories (N-1 data + 1 parity)
    pub num_disks: usize,

    /// Root under which the shard directories live
    pub upload_path: PathBuf,

    /// Shard directory `i` is named `<folder_prefix>-<i>`
    pub folder_prefix: String,

    /// Largest accepted payload (bytes)
    pub max_size: usize,

    /// HTTP bind address
    pub listen_addr: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            num_disks: 3,
            upload_path: PathBuf::from("/var/raid5"),
            folder_prefix: "raid".to_string(),
            max_size: 1024 * 1024, // 1 MiB
            listen_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Apply `NUM_DISKS`, `UPLOAD_PATH`, `FOLDER_PREFIX` and `MAX_SIZE`
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("NUM_DISKS") {
            self.num_disks = parse_number("NUM_DISKS", &v)?;
        }
        if let Some(v) = lookup("UPLOAD_PATH") {
            self.upload_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FOLDER_PREFIX") {
            self.folder_prefix = v;
        }
        if let Some(v) = lookup("MAX_SIZE") {
            self.max_size = parse_number("MAX_SIZE", &v)?;
        }
        Ok(self)
    }

    /// Override config with CLI arguments
    pub fn with_overrides(
        mut self,
        data_dir: Option<PathBuf>,
        disks: Option<usize>,
        listen: Option<String>,
    ) -> Self {
        if let Some(dir) = data_dir {
            self.upload_path = dir;
        }
        if let Some(n) = disks {
            self.num_disks = n;
        }
        if let Some(addr) = listen {
            self.listen_addr = addr;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_disks < 2 {
            return Err(ConfigError::ValidationError(format!(
                "num_disks must be at least 2, got {}",
                self.num_disks
            )));
        }
        if self.max_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_size cannot be 0".to_string(),
            ));
        }
        if self.folder_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "folder_prefix cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{} must be a number, got {:?}", key, value))
    })
}
