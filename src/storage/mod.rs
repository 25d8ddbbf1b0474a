//! Storage Module - RAID-5 style striping with XOR parity
//!
//! Splits each file across N-1 data shard directories plus one parity
//! directory so that any single lost shard can be rebuilt.

mod file_store;
mod integrity;
mod layout;
mod parity;
mod rebuild;

pub use file_store::{FileMetadata, FileStore};
pub use integrity::{IntegrityChecker, StripeState};
pub use layout::ShardLayout;
pub use parity::{
    partition, reassemble, strip_padding, xor_reduce, EncodedStripe, Shard, StripeConfig,
};
pub use rebuild::{RebuildReport, Reconstructor};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File already exists: {0}")]
    Conflict(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File too large: {size} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Shard index {index} out of range for {disks} disks")]
    InvalidShardIndex { index: usize, disks: usize },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// HTTP status the API layer reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::Conflict(_) => 409,
            StorageError::NotFound(_) => 404,
            StorageError::PayloadTooLarge { .. } => 413,
            StorageError::InvalidName(_)
            | StorageError::InvalidShardIndex { .. }
            | StorageError::InvalidLayout(_) => 400,
            StorageError::Io(_) => 500,
        }
    }
}

/// Reject names that would escape a shard directory.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(|c: char| c == '/' || c == '\\') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
