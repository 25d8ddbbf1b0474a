//! Stripe integrity checking
//!
//! A stripe is intact only when every shard exists, all shards share one
//! length and the parity shard equals the XOR of the data shards. Any other
//! stripe is deleted on sight so that a file is either whole or gone.

use super::{xor_reduce, ShardLayout, StorageError};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Outcome of an integrity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeState {
    /// All shards present, equal length, parity matches
    Intact,
    /// At least one shard missing; remaining shards were removed
    Absent,
    /// Lengths or parity disagree; all shards were removed
    Corrupt,
}

impl StripeState {
    pub fn is_intact(&self) -> bool {
        matches!(self, StripeState::Intact)
    }
}

/// Validates stripes and removes broken ones
pub struct IntegrityChecker<'a> {
    layout: &'a ShardLayout,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(layout: &'a ShardLayout) -> Self {
        Self { layout }
    }

    /// Check the stripe for `name`, deleting it unless it is intact
    pub async fn check(&self, name: &str) -> Result<StripeState, StorageError> {
        let paths = self.layout.stripe_paths(name)?;

        for path in &paths {
            if !tokio::fs::try_exists(path).await? {
                let removed = remove_shards(&paths).await?;
                if removed > 0 {
                    tracing::warn!(
                        file = %name,
                        removed,
                        "Incomplete stripe, deleted remaining shards"
                    );
                }
                return Ok(StripeState::Absent);
            }
        }

        let mut shards = Vec::with_capacity(paths.len());
        for path in &paths {
            shards.push(tokio::fs::read(path).await?);
        }

        let len = shards[0].len();
        if shards.iter().any(|s| s.len() != len) {
            tracing::warn!(file = %name, "Shard lengths differ, deleting stripe");
            remove_shards(&paths).await?;
            return Ok(StripeState::Corrupt);
        }

        let (parity, data) = shards.split_last().ok_or_else(|| {
            StorageError::InvalidLayout("stripe without shards".into())
        })?;
        if xor_reduce(data) != *parity {
            tracing::warn!(file = %name, "Parity mismatch, deleting stripe");
            remove_shards(&paths).await?;
            return Ok(StripeState::Corrupt);
        }

        tracing::debug!(file = %name, shard_len = len, "Stripe intact");
        Ok(StripeState::Intact)
    }
}

/// Remove every shard file that exists, returning how many were removed
pub(crate) async fn remove_shards(paths: &[PathBuf]) -> Result<usize, StorageError> {
    let mut removed = 0;
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}
