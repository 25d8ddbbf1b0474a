//! Single-disk reconstruction
//!
//! Rebuilds every shard of one lost shard directory by XOR-ing the shards
//! held in the surviving directories.

use super::{xor_reduce, ShardLayout, StorageError};
use serde::{Deserialize, Serialize};

/// Summary of a rebuild pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Shard index that was rebuilt
    pub shard: usize,

    /// Files whose shard was rewritten
    pub rebuilt: usize,

    /// Files skipped because another shard was missing too, or because
    /// their on-disk name is not valid UTF-8 (listed lossily)
    pub skipped: Vec<String>,

    /// Files whose stripe failed the parity check after the rewrite
    pub unverified: Vec<String>,
}

impl RebuildReport {
    /// True when every file was rebuilt and verified
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.unverified.is_empty()
    }
}

/// Rebuilds a lost shard directory
pub struct Reconstructor<'a> {
    layout: &'a ShardLayout,
}

impl<'a> Reconstructor<'a> {
    pub fn new(layout: &'a ShardLayout) -> Self {
        Self { layout }
    }

    /// Recreate shard `bad_index` for every file found in a surviving directory
    pub async fn rebuild(&self, bad_index: usize) -> Result<RebuildReport, StorageError> {
        // validates the index before any I/O
        self.layout.shard_dir(bad_index)?;
        self.layout.ensure_dirs().await?;

        let source = if bad_index != 0 { 0 } else { 1 };
        let listing = list_files(self.layout, source).await?;

        let mut report = RebuildReport {
            shard: bad_index,
            skipped: listing.unreadable,
            ..Default::default()
        };

        for name in listing.names {
            let mut survivors = Vec::with_capacity(self.layout.disks() - 1);
            let mut complete = true;
            for i in (0..self.layout.disks()).filter(|&i| i != bad_index) {
                match tokio::fs::read(self.layout.shard_path(i, &name)?).await {
                    Ok(bytes) => survivors.push(bytes),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        complete = false;
                        break;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if !complete {
                tracing::warn!(file = %name, shard = bad_index, "Second shard missing, cannot rebuild");
                report.skipped.push(name);
                continue;
            }

            let rebuilt = xor_reduce(&survivors);
            tokio::fs::write(self.layout.shard_path(bad_index, &name)?, &rebuilt).await?;
            tracing::debug!(file = %name, shard = bad_index, len = rebuilt.len(), "Shard rebuilt");
            report.rebuilt += 1;

            if !self.verify(&name).await? {
                tracing::warn!(file = %name, shard = bad_index, "Rebuilt stripe fails parity check");
                report.unverified.push(name);
            }
        }

        tracing::info!(
            shard = bad_index,
            rebuilt = report.rebuilt,
            skipped = report.skipped.len(),
            unverified = report.unverified.len(),
            "Rebuild finished"
        );

        Ok(report)
    }

    /// Re-read a stripe and check lengths and parity without deleting anything
    async fn verify(&self, name: &str) -> Result<bool, StorageError> {
        let mut shards = Vec::with_capacity(self.layout.disks());
        for path in self.layout.stripe_paths(name)? {
            shards.push(tokio::fs::read(path).await?);
        }

        let len = shards[0].len();
        if shards.iter().any(|s| s.len() != len) {
            return Ok(false);
        }

        match shards.split_last() {
            Some((parity, data)) => Ok(xor_reduce(data) == *parity),
            None => Ok(false),
        }
    }
}

/// Regular files found in one shard directory
#[derive(Debug, Default)]
pub(crate) struct ShardListing {
    /// Sorted UTF-8 file names
    pub names: Vec<String>,

    /// Lossy renderings of names that are not valid UTF-8
    pub unreadable: Vec<String>,
}

/// List regular files in shard directory `index`
pub(crate) async fn list_files(
    layout: &ShardLayout,
    index: usize,
) -> Result<ShardListing, StorageError> {
    let mut listing = ShardListing::default();
    let mut entries = tokio::fs::read_dir(layout.shard_dir(index)?).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => listing.names.push(name),
            Err(raw) => {
                let lossy = raw.to_string_lossy().into_owned();
                tracing::warn!(file = %lossy, shard = index, "File name is not valid UTF-8");
                listing.unreadable.push(lossy);
            }
        }
    }
    listing.names.sort();
    listing.unreadable.sort();
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::partition;
    use tempfile::TempDir;

    async fn setup(disks: usize) -> (TempDir, ShardLayout) {
        let temp_dir = TempDir::new().unwrap();
        let layout = ShardLayout::new(temp_dir.path(), "raid", disks).unwrap();
        layout.ensure_dirs().await.unwrap();
        (temp_dir, layout)
    }

    async fn write_stripe(layout: &ShardLayout, name: &str, data: &[u8]) -> Vec<Vec<u8>> {
        let shards = partition(data, layout.config()).into_shards();
        for shard in &shards {
            let path = layout.shard_path(shard.index, name).unwrap();
            tokio::fs::write(path, &shard.data).await.unwrap();
        }
        shards.into_iter().map(|s| s.data).collect()
    }

    #[tokio::test]
    async fn test_rebuild_each_shard() {
        for bad in 0..4 {
            let (_dir, layout) = setup(4).await;
            let a = write_stripe(&layout, "a.bin", b"first file payload").await;
            let b = write_stripe(&layout, "b.bin", b"second, a bit longer payload").await;

            tokio::fs::remove_dir_all(layout.shard_dir(bad).unwrap())
                .await
                .unwrap();

            let report = Reconstructor::new(&layout).rebuild(bad).await.unwrap();

            assert_eq!(report.shard, bad);
            assert_eq!(report.rebuilt, 2);
            assert!(report.is_clean());
            let rebuilt_a = tokio::fs::read(layout.shard_path(bad, "a.bin").unwrap())
                .await
                .unwrap();
            let rebuilt_b = tokio::fs::read(layout.shard_path(bad, "b.bin").unwrap())
                .await
                .unwrap();
            assert_eq!(rebuilt_a, a[bad]);
            assert_eq!(rebuilt_b, b[bad]);
        }
    }

    #[tokio::test]
    async fn test_rebuild_skips_doubly_damaged_file() {
        let (_dir, layout) = setup(4).await;
        write_stripe(&layout, "ok.bin", b"healthy").await;
        write_stripe(&layout, "lost.bin", b"too many losses").await;

        tokio::fs::remove_file(layout.shard_path(1, "ok.bin").unwrap())
            .await
            .unwrap();
        tokio::fs::remove_file(layout.shard_path(1, "lost.bin").unwrap())
            .await
            .unwrap();
        tokio::fs::remove_file(layout.shard_path(2, "lost.bin").unwrap())
            .await
            .unwrap();

        let report = Reconstructor::new(&layout).rebuild(1).await.unwrap();

        assert_eq!(report.rebuilt, 1);
        assert_eq!(report.skipped, vec!["lost.bin".to_string()]);
        assert!(!layout.shard_path(1, "lost.bin").unwrap().exists());
    }

    #[tokio::test]
    async fn test_rebuild_reports_unverified_stripe() {
        let (_dir, layout) = setup(3).await;
        write_stripe(&layout, "uneven.bin", b"abcd").await;
        tokio::fs::write(layout.shard_path(1, "uneven.bin").unwrap(), b"xyz")
            .await
            .unwrap();

        let report = Reconstructor::new(&layout).rebuild(2).await.unwrap();

        assert_eq!(report.rebuilt, 1);
        assert_eq!(report.unverified, vec!["uneven.bin".to_string()]);
    }

    #[tokio::test]
    async fn test_rebuild_empty_directory() {
        let (_dir, layout) = setup(3).await;

        let report = Reconstructor::new(&layout).rebuild(0).await.unwrap();

        assert_eq!(report.rebuilt, 0);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_rebuild_invalid_index() {
        let (_dir, layout) = setup(3).await;

        let result = Reconstructor::new(&layout).rebuild(3).await;

        assert!(matches!(
            result,
            Err(StorageError::InvalidShardIndex { index: 3, disks: 3 })
        ));
    }

    #[tokio::test]
    async fn test_list_files_ignores_directories() {
        let (_dir, layout) = setup(3).await;
        write_stripe(&layout, "b", b"2").await;
        write_stripe(&layout, "a", b"1").await;
        tokio::fs::create_dir(layout.shard_dir(0).unwrap().join("nested"))
            .await
            .unwrap();

        let listing = list_files(&layout, 0).await.unwrap();

        assert_eq!(listing.names, vec!["a".to_string(), "b".to_string()]);
        assert!(listing.unreadable.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rebuild_reports_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_dir, layout) = setup(3).await;
        write_stripe(&layout, "good.bin", b"fine").await;
        let raw = OsStr::from_bytes(b"bad\xff");
        for i in 0..3 {
            tokio::fs::write(layout.shard_dir(i).unwrap().join(raw), b"x")
                .await
                .unwrap();
        }
        tokio::fs::remove_dir_all(layout.shard_dir(2).unwrap())
            .await
            .unwrap();

        let report = Reconstructor::new(&layout).rebuild(2).await.unwrap();

        assert_eq!(report.rebuilt, 1);
        assert_eq!(report.skipped, vec!["bad\u{FFFD}".to_string()]);
        assert!(!report.is_clean());
        assert!(!layout.shard_dir(2).unwrap().join(raw).exists());
    }
}
