//! Contains the trait for hashing record keys and the default hasher.
//! A hasher must be deterministic: the index is rebuilt from the data file on every open and
//! buckets are split by re-hashing stored keys, so a key has to land on the same hash each time.

/// Seed fed to the hash function for every key hash.
pub const KEY_HASH_SEED: u32 = 0xb911_5a39;

/// A 64 bit non-cryptographic hash over a byte range with a caller supplied seed.
pub trait RecordHasher {
    /// Hash `bytes` with `seed`.
    fn hash(&self, bytes: &[u8], seed: u32) -> u64;
}

/// Default hasher backed by 64 bit xxHash.
#[derive(Debug, Default, Clone, Copy)]
pub struct XxHasher;

impl RecordHasher for XxHasher {
    fn hash(&self, bytes: &[u8], seed: u32) -> u64 {
        xxhash_rust::xxh64::xxh64(bytes, u64::from(seed))
    }
}
