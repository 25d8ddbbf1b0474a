//! XOR parity striping
//!
//! Splits data into N-1 equally sized data shards and one parity shard.
//! Any single shard can be recovered by XOR-ing the other N-1.

use super::StorageError;

/// Shape of a stripe: how many shard directories a file is spread over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeConfig {
    /// Total number of disks (data + parity)
    disks: usize,
}

impl StripeConfig {
    /// Create a stripe config for `disks` shard directories (at least 2)
    pub fn new(disks: usize) -> Result<Self, StorageError> {
        if disks < 2 {
            return Err(StorageError::InvalidLayout(format!(
                "need at least 2 disks, got {}",
                disks
            )));
        }
        Ok(Self { disks })
    }

    /// Total number of shards per stripe
    pub fn total_shards(&self) -> usize {
        self.disks
    }

    /// Number of data shards
    pub fn data_shards(&self) -> usize {
        self.disks - 1
    }

    /// Disk index holding the parity shard (always the last one)
    pub fn parity_index(&self) -> usize {
        self.disks - 1
    }

    /// Padded shard length for a payload of `data_len` bytes
    pub fn shard_len(&self, data_len: usize) -> usize {
        (data_len + self.data_shards() - 1) / self.data_shards()
    }
}

/// A single shard of a stripe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Disk index (0 to total_shards - 1)
    pub index: usize,

    /// Padded shard bytes
    pub data: Vec<u8>,

    /// Is this the parity shard?
    pub is_parity: bool,
}

/// A partitioned file: data shards in stripe order plus parity
#[derive(Debug, Clone)]
pub struct EncodedStripe {
    /// Unpadded payload length
    pub original_size: usize,

    /// N-1 zero-padded data shards
    pub data_shards: Vec<Vec<u8>>,

    /// XOR of all data shards
    pub parity: Vec<u8>,
}

impl EncodedStripe {
    /// Padded length shared by every shard
    pub fn shard_len(&self) -> usize {
        self.parity.len()
    }

    /// Check that the parity shard matches the data shards
    pub fn verify(&self) -> bool {
        xor_reduce(&self.data_shards) == self.parity
    }

    /// All shards in disk order, parity last
    pub fn into_shards(self) -> Vec<Shard> {
        let parity_index = self.data_shards.len();
        self.data_shards
            .into_iter()
            .enumerate()
            .map(|(index, data)| Shard {
                index,
                data,
                is_parity: false,
            })
            .chain(std::iter::once(Shard {
                index: parity_index,
                data: self.parity,
                is_parity: true,
            }))
            .collect()
    }
}

/// Partition `data` into N-1 data shards and an XOR parity shard.
///
/// Chunk sizes differ by at most one byte; the leading chunks take the
/// remainder. Every chunk is right-padded with zeros to the longest one.
pub fn partition(data: &[u8], config: StripeConfig) -> EncodedStripe {
    let count = config.data_shards();
    let base = data.len() / count;
    let remainder = data.len() % count;
    let shard_len = config.shard_len(data.len());

    let mut data_shards = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = base + usize::from(i < remainder);
        let mut shard = data[start..start + len].to_vec();
        shard.resize(shard_len, 0);
        data_shards.push(shard);
        start += len;
    }

    let parity = xor_reduce(&data_shards);

    EncodedStripe {
        original_size: data.len(),
        data_shards,
        parity,
    }
}

/// Byte-wise XOR of all blocks.
///
/// The result is as long as the longest block; shorter blocks behave as if
/// zero-extended.
pub fn xor_reduce<B: AsRef<[u8]>>(blocks: &[B]) -> Vec<u8> {
    let len = blocks.iter().map(|b| b.as_ref().len()).max().unwrap_or(0);
    let mut out = vec![0u8; len];
    for block in blocks {
        for (acc, byte) in out.iter_mut().zip(block.as_ref()) {
            *acc ^= byte;
        }
    }
    out
}

/// Drop trailing zero padding from a data shard.
///
/// Lossy whenever a data chunk's real bytes end in `0x00`. That covers
/// payloads ending in zeros and also interior zeros that land on the last
/// byte of a chunk.
pub fn strip_padding(shard: &[u8]) -> &[u8] {
    let end = shard.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &shard[..end]
}

/// Concatenate data shards in stripe order with padding removed
pub fn reassemble<B: AsRef<[u8]>>(data_shards: &[B]) -> Vec<u8> {
    let mut out = Vec::new();
    for shard in data_shards {
        out.extend_from_slice(strip_padding(shard.as_ref()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(disks: usize) -> StripeConfig {
        StripeConfig::new(disks).unwrap()
    }

    #[test]
    fn test_stripe_config() {
        let config = config(4);

        assert_eq!(config.total_shards(), 4);
        assert_eq!(config.data_shards(), 3);
        assert_eq!(config.parity_index(), 3);
        assert_eq!(config.shard_len(0), 0);
        assert_eq!(config.shard_len(7), 3);
        assert_eq!(config.shard_len(9), 3);

        assert!(matches!(
            StripeConfig::new(1),
            Err(StorageError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_partition_two_bytes_three_disks() {
        let stripe = partition(b"hi", config(3));

        assert_eq!(stripe.data_shards, vec![b"h".to_vec(), b"i".to_vec()]);
        assert_eq!(stripe.parity, vec![b'h' ^ b'i']);
        assert!(stripe.verify());
    }

    #[test]
    fn test_partition_remainder_goes_to_leading_chunks() {
        let stripe = partition(b"abcdefg", config(4));

        assert_eq!(stripe.data_shards[0], b"abc".to_vec());
        assert_eq!(stripe.data_shards[1], b"de\0".to_vec());
        assert_eq!(stripe.data_shards[2], b"fg\0".to_vec());
        assert_eq!(stripe.shard_len(), 3);
        assert_eq!(reassemble(&stripe.data_shards), b"abcdefg".to_vec());
    }

    #[test]
    fn test_partition_shorter_than_shard_count() {
        let stripe = partition(b"x", config(5));

        assert_eq!(stripe.data_shards.len(), 4);
        assert_eq!(stripe.data_shards[0], b"x".to_vec());
        assert!(stripe.data_shards[1..].iter().all(|s| s == &vec![0u8]));
        assert_eq!(stripe.parity, b"x".to_vec());
    }

    #[test]
    fn test_partition_empty() {
        let stripe = partition(b"", config(3));

        assert_eq!(stripe.data_shards, vec![Vec::<u8>::new(), Vec::new()]);
        assert!(stripe.parity.is_empty());
        assert!(stripe.verify());
        assert!(reassemble(&stripe.data_shards).is_empty());
    }

    #[test]
    fn test_partition_two_disks_mirrors() {
        let stripe = partition(b"mirror", config(2));

        assert_eq!(stripe.data_shards, vec![b"mirror".to_vec()]);
        assert_eq!(stripe.parity, b"mirror".to_vec());
    }

    #[test]
    fn test_into_shards_order() {
        let shards = partition(b"hello world", config(3)).into_shards();

        assert_eq!(shards.len(), 3);
        assert_eq!(shards.iter().filter(|s| s.is_parity).count(), 1);
        assert!(shards[2].is_parity);
        assert_eq!(
            shards.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_trailing_zero_payload_is_lossy() {
        let stripe = partition(b"ab\0\0", config(3));
        assert_eq!(reassemble(&stripe.data_shards), b"ab".to_vec());
    }

    #[test]
    fn test_zero_at_chunk_end_is_lossy() {
        let stripe = partition(b"a\0bc", config(3));

        assert_eq!(stripe.data_shards, vec![b"a\0".to_vec(), b"bc".to_vec()]);
        assert_eq!(reassemble(&stripe.data_shards), b"abc".to_vec());
    }

    #[test]
    fn test_xor_reduce_uneven_lengths() {
        let blocks = vec![vec![0xFFu8, 0x0F], vec![0x0Fu8]];
        assert_eq!(xor_reduce(&blocks), vec![0xF0, 0x0F]);

        let empty: Vec<Vec<u8>> = vec![];
        assert!(xor_reduce(&empty).is_empty());
    }

    #[test]
    fn test_strip_padding() {
        assert_eq!(strip_padding(b"ab\0\0"), b"ab");
        assert_eq!(strip_padding(b"\0\0"), b"");
        assert_eq!(strip_padding(b"a\0b"), b"a\0b");
    }

    #[test]
    fn test_recover_any_single_shard() {
        let original: Vec<u8> = (0..10_000).map(|i| (i % 251) as u8 + 1).collect();
        let shards: Vec<Vec<u8>> = partition(&original, config(5))
            .into_shards()
            .into_iter()
            .map(|s| s.data)
            .collect();

        for lost in 0..shards.len() {
            let survivors: Vec<&Vec<u8>> = shards
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != lost)
                .map(|(_, s)| s)
                .collect();
            assert_eq!(xor_reduce(&survivors), shards[lost]);
        }
    }

    proptest! {
        #[test]
        fn prop_parity_holds(data in proptest::collection::vec(any::<u8>(), 0..2048), disks in 2usize..9) {
            let stripe = partition(&data, config(disks));

            prop_assert_eq!(stripe.data_shards.len(), disks - 1);
            prop_assert!(stripe.data_shards.iter().all(|s| s.len() == stripe.shard_len()));
            prop_assert!(stripe.verify());
        }

        #[test]
        fn prop_reassemble_without_zero_bytes(data in proptest::collection::vec(1u8..=255, 0..2048), disks in 2usize..9) {
            let stripe = partition(&data, config(disks));
            prop_assert_eq!(reassemble(&stripe.data_shards), data);
        }
    }
}
