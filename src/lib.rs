//! Raid5 Store - RAID-5 style file storage over local directories
//!
//! Each file is striped across N-1 data shard directories plus one XOR
//! parity directory. Any single missing or corrupted shard can be rebuilt,
//! and broken stripes are detected (and removed) on every access.

pub mod api;
pub mod config;
pub mod storage;

pub use config::StoreConfig;
pub use storage::{FileMetadata, FileStore, StorageError, StripeState};

use thiserror::Error;

/// Main error type for Raid5 Store operations
#[derive(Error, Debug)]
pub enum Raid5Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Raid5Error>;

/// Validate `config` and open a store over its shard directories
pub async fn open_store(config: &StoreConfig) -> Result<FileStore> {
    config.validate()?;
    Ok(FileStore::from_config(config).await?)
}
