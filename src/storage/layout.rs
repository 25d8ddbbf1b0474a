//! Shard directory layout
//!
//! Directory `i` under the storage root is named `<prefix>-<i>` and holds
//! shard `i` of every stripe under the file's logical name.

use super::{validate_name, StorageError, StripeConfig};
use std::path::{Path, PathBuf};

/// Maps shard indices to physical directories
#[derive(Debug, Clone)]
pub struct ShardLayout {
    root: PathBuf,
    config: StripeConfig,
    dirs: Vec<PathBuf>,
}

impl ShardLayout {
    /// Build the layout for `disks` shard directories under `root`
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: &str,
        disks: usize,
    ) -> Result<Self, StorageError> {
        let config = StripeConfig::new(disks)?;
        if prefix.is_empty() {
            return Err(StorageError::InvalidLayout("empty folder prefix".into()));
        }

        let root = root.into();
        let dirs = (0..disks)
            .map(|i| root.join(format!("{}-{}", prefix, i)))
            .collect();

        Ok(Self { root, config, dirs })
    }

    /// Create every shard directory that does not exist yet
    pub async fn ensure_dirs(&self) -> Result<(), StorageError> {
        for dir in &self.dirs {
            if !tokio::fs::try_exists(dir).await? {
                tracing::warn!(dir = %dir.display(), "Creating shard directory");
            }
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> StripeConfig {
        self.config
    }

    pub fn disks(&self) -> usize {
        self.dirs.len()
    }

    /// Directory of shard `index`
    pub fn shard_dir(&self, index: usize) -> Result<&Path, StorageError> {
        self.dirs
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(StorageError::InvalidShardIndex {
                index,
                disks: self.dirs.len(),
            })
    }

    /// Path of shard `index` for the logical file `name`
    pub fn shard_path(&self, index: usize, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.shard_dir(index)?.join(name))
    }

    /// Paths of all N shards for `name`, in disk order
    pub fn stripe_paths(&self, name: &str) -> Result<Vec<PathBuf>, StorageError> {
        validate_name(name)?;
        Ok(self.dirs.iter().map(|dir| dir.join(name)).collect())
    }
}
