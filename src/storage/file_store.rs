//! File Store - CRUD over striped shard directories
//!
//! Every operation re-checks stripe integrity first; broken stripes are
//! removed and reported as missing. Writes are a sequence of independent
//! shard writes with no transaction around them.

use super::integrity::remove_shards;
use super::rebuild::list_files;
use super::{
    partition, reassemble, IntegrityChecker, RebuildReport, Reconstructor, ShardLayout,
    StorageError, StripeState,
};
use crate::config::StoreConfig;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Metadata returned by writes. Derived from the payload, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Logical file name (also the on-disk shard name)
    pub name: String,

    /// Unpadded payload size (bytes)
    pub size: u64,

    /// Hex MD5 of the payload
    pub checksum: String,

    /// MIME type
    pub content_type: String,

    /// Base64 (standard alphabet, padded) of the payload
    pub content: String,
}

impl FileMetadata {
    fn describe(name: &str, data: &[u8], content_type: Option<&str>) -> Self {
        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .to_string()
            });

        Self {
            name: name.to_string(),
            size: data.len() as u64,
            checksum: format!("{:x}", md5::compute(data)),
            content_type,
            content: base64::engine::general_purpose::STANDARD.encode(data),
        }
    }
}

/// Owns the shard directories and exposes file-level operations
pub struct FileStore {
    layout: ShardLayout,
    max_size: usize,
}

impl FileStore {
    /// Create a store and make sure all shard directories exist
    pub async fn open(layout: ShardLayout, max_size: usize) -> Result<Self, StorageError> {
        layout.ensure_dirs().await?;
        tracing::info!(
            root = %layout.root().display(),
            disks = layout.disks(),
            max_size,
            "File store ready"
        );
        Ok(Self { layout, max_size })
    }

    /// Create a store from configuration
    pub async fn from_config(config: &StoreConfig) -> Result<Self, StorageError> {
        let layout = ShardLayout::new(
            &config.upload_path,
            &config.folder_prefix,
            config.num_disks,
        )?;
        Self::open(layout, config.max_size).await
    }

    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Check (and self-heal) the stripe for `name`
    pub async fn check(&self, name: &str) -> Result<StripeState, StorageError> {
        IntegrityChecker::new(&self.layout).check(name).await
    }

    /// Store a new file; fails if an intact file already has this name
    pub async fn create(
        &self,
        name: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<FileMetadata, StorageError> {
        if self.check(name).await?.is_intact() {
            tracing::warn!(file = %name, "File already exists");
            return Err(StorageError::Conflict(name.to_string()));
        }
        self.write_stripe(name, data, content_type).await
    }

    /// Read a file back; a broken stripe is deleted and reported as missing
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.require_intact(name).await?;

        let paths = self.layout.stripe_paths(name)?;
        let parity_index = self.layout.config().parity_index();
        let mut data_shards = Vec::with_capacity(parity_index);
        for path in &paths[..parity_index] {
            data_shards.push(tokio::fs::read(path).await?);
        }

        Ok(reassemble(&data_shards))
    }

    /// Replace the contents of an existing file
    pub async fn update(
        &self,
        name: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<FileMetadata, StorageError> {
        self.require_intact(name).await?;
        self.write_stripe(name, data, content_type).await
    }

    /// Remove an existing file from every shard directory
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.require_intact(name).await?;
        remove_shards(&self.layout.stripe_paths(name)?).await?;
        tracing::info!(file = %name, "File deleted");
        Ok(())
    }

    /// Rebuild shard directory `bad_index` from the survivors
    pub async fn rebuild(&self, bad_index: usize) -> Result<RebuildReport, StorageError> {
        Reconstructor::new(&self.layout).rebuild(bad_index).await
    }

    /// True when every shard of `name` exists. Reads no contents, deletes nothing.
    pub async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        for path in self.layout.stripe_paths(name)? {
            if !tokio::fs::try_exists(&path).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Names present in the first shard directory. Names that are not valid
    /// UTF-8 are logged and left out.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(list_files(&self.layout, 0).await?.names)
    }

    async fn require_intact(&self, name: &str) -> Result<(), StorageError> {
        if !self.check(name).await?.is_intact() {
            tracing::warn!(file = %name, "File not found");
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn write_stripe(
        &self,
        name: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<FileMetadata, StorageError> {
        if data.len() > self.max_size {
            return Err(StorageError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let metadata = FileMetadata::describe(name, data, content_type);
        let stripe = partition(data, self.layout.config());
        let shard_len = stripe.shard_len();

        for shard in stripe.into_shards() {
            let path = self.layout.shard_path(shard.index, name)?;
            tokio::fs::write(&path, &shard.data).await?;
            tracing::debug!(file = %name, shard = shard.index, parity = shard.is_parity, "Shard written");
        }

        tracing::info!(file = %name, size = metadata.size, shard_len, "Stripe written");
        Ok(metadata)
    }
}
