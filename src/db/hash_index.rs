//! Contains the in-memory fingerprint hash index.
//! Maps keys to record numbers via two bucket arenas (primary table and overflow chains) and
//! linear hashing metadata.  Nothing here touches the data file directly, file access is
//! injected through closures so the index stays a plain in-memory structure.

use crate::db::page_manager::{FingerprintBucket, PageManager, RECORDS_PER_BUCKET};
use std::io;

/// Target load factor when none is configured.
pub(crate) const DEFAULT_MAX_LOAD: f32 = 0.5;

/// Which arena a bucket lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BucketRef {
    /// A primary table bin.
    Table(u64),
    /// An overflow bucket handle.
    Overflow(u32),
}

/// A single slot within a bucket.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlotLoc {
    pub bucket: BucketRef,
    pub slot: usize,
}

/// Outcome of walking a bucket chain for a key.
pub(crate) enum Probe {
    /// The key is present, with its slot and record number.
    Found(SlotLoc, u32),
    /// The chain has a free slot; for a lookup this means the key is absent.
    Vacant(SlotLoc),
    /// Every slot in the chain is taken and nothing matched; `0` is the chain's last bucket.
    Tail(BucketRef),
}

/// The fingerprint hash table plus the linear hashing metadata needed to pick bins.
pub(crate) struct HashIndex {
    hash_table: PageManager,
    overflow_buckets: PageManager,
    hash_table_size_a: u32,
    hash_table_size_b: u32,
    fingerprint_mod: u32,
    num_records: u32,
    max_load: f32,
    max_overflow_depth: u32,
}

impl HashIndex {
    /// Create an index with `starting_buckets` bins sized for `max_load`.
    /// Overflow bucket 0 is a preallocated dummy, it doubles as the end of chain marker.
    pub fn new(starting_buckets: u32, max_load: f32) -> Self {
        let starting_buckets = starting_buckets.max(1);
        let mut index = Self {
            hash_table: PageManager::new(starting_buckets),
            overflow_buckets: PageManager::new(2),
            hash_table_size_a: starting_buckets,
            hash_table_size_b: starting_buckets,
            fingerprint_mod: 0,
            num_records: 0,
            max_load,
            max_overflow_depth: 0,
        };
        index.recompute_fingerprint_mod();
        index
    }

    /// Largest power of two multiple of the base table size that fits in 32 bits.
    /// A wide modulus keeps fingerprints spread over as many bits as possible while staying
    /// uniform modulo the table size.
    fn recompute_fingerprint_mod(&mut self) {
        let mut modulus = self.hash_table_size_a;
        while let Some(next) = modulus.checked_mul(2) {
            modulus = next;
        }
        self.fingerprint_mod = modulus;
    }

    /// Derive the non-zero fingerprint and the bin for a key hash.
    /// A zero fingerprint would read as an empty slot, so the hash is nudged until the
    /// fingerprint is non-zero (the bin moves with it).  Bins below the split point belong to
    /// an already split region and use the doubled modulus.
    pub fn fingerprint_and_bin(&self, hash: u64) -> (u32, u64) {
        let mut hash = hash;
        let mut fingerprint = (hash % u64::from(self.fingerprint_mod)) as u32;
        if fingerprint == 0 {
            if hash < u64::MAX {
                hash += 1;
            } else {
                hash -= 1;
            }
            fingerprint = (hash % u64::from(self.fingerprint_mod)) as u32;
        }

        let bin_a = hash % u64::from(self.hash_table_size_a);
        let split_point = u64::from(self.hash_table_size_b - self.hash_table_size_a);
        let bin = if bin_a < split_point {
            hash % (2 * u64::from(self.hash_table_size_a))
        } else {
            bin_a
        };
        (fingerprint, bin)
    }

    fn bucket(&self, bucket: BucketRef) -> &FingerprintBucket {
        match bucket {
            BucketRef::Table(bin) => self.hash_table.get(bin as u32),
            BucketRef::Overflow(index) => self.overflow_buckets.get(index),
        }
    }

    fn bucket_mut(&mut self, bucket: BucketRef) -> &mut FingerprintBucket {
        match bucket {
            BucketRef::Table(bin) => self.hash_table.get_mut(bin as u32),
            BucketRef::Overflow(index) => self.overflow_buckets.get_mut(index),
        }
    }

    /// Walk the chain rooted at `bin` looking for `fingerprint`.
    /// `key_matches` reads the key of a candidate record and compares it against the lookup
    /// key, disambiguating fingerprint collisions.  Returns the probe outcome and the number
    /// of overflow buckets walked.
    pub fn probe(
        &mut self,
        fingerprint: u32,
        bin: u64,
        key_matches: &mut dyn FnMut(u32) -> io::Result<bool>,
    ) -> io::Result<(Probe, u32)> {
        let mut depth = 0;
        let mut cur = BucketRef::Table(bin);
        loop {
            let bucket = *self.bucket(cur);
            for slot in 0..RECORDS_PER_BUCKET {
                let slot_fp = bucket.fingerprints[slot];
                if slot_fp == 0 {
                    // Slots fill left to right, an empty one ends the search.
                    self.note_overflow_depth(depth);
                    return Ok((Probe::Vacant(SlotLoc { bucket: cur, slot }), depth));
                }
                if slot_fp == fingerprint && key_matches(bucket.file_index[slot])? {
                    self.note_overflow_depth(depth);
                    return Ok((
                        Probe::Found(SlotLoc { bucket: cur, slot }, bucket.file_index[slot]),
                        depth,
                    ));
                }
            }
            if bucket.overflow_index == 0 {
                self.note_overflow_depth(depth);
                return Ok((Probe::Tail(cur), depth));
            }
            depth += 1;
            cur = BucketRef::Overflow(bucket.overflow_index);
        }
    }

    /// Claim a free slot for a new record, handing back its record number.
    pub fn claim_slot(&mut self, loc: SlotLoc, fingerprint: u32) -> u32 {
        let file_index = self.num_records;
        let bucket = self.bucket_mut(loc.bucket);
        bucket.fingerprints[loc.slot] = fingerprint;
        bucket.file_index[loc.slot] = file_index;
        self.num_records += 1;
        file_index
    }

    /// Start a new overflow bucket at the end of `tail`'s chain and claim its first slot.
    pub fn extend_chain(&mut self, tail: BucketRef, fingerprint: u32) -> u32 {
        let new_index = self.overflow_buckets.first_empty_bucket_index();
        self.bucket_mut(tail).overflow_index = new_index;
        self.claim_slot(
            SlotLoc {
                bucket: BucketRef::Overflow(new_index),
                slot: 0,
            },
            fingerprint,
        )
    }

    pub fn num_records(&self) -> u32 {
        self.num_records
    }

    /// Current table size including any partially completed expansion round.
    pub fn current_size(&self) -> u32 {
        self.hash_table_size_b
    }

    /// Deepest overflow chain walked so far.
    pub fn max_overflow_depth(&self) -> u32 {
        self.max_overflow_depth
    }

    pub fn note_overflow_depth(&mut self, depth: u32) {
        if depth > self.max_overflow_depth {
            self.max_overflow_depth = depth;
        }
    }

    /// True if one more record would push the table past its load target.
    /// Load is records per slot: `num_records / (buckets * slots per bucket)`.
    fn over_load(&self) -> bool {
        let capacity = u64::from(self.hash_table_size_b) * RECORDS_PER_BUCKET as u64;
        f64::from(self.num_records) > capacity as f64 * f64::from(self.max_load)
    }

    /// Split buckets until the load target holds again.
    /// `read_hash` re-hashes the key of a stored record so entries can be re-binned.
    pub fn expand(
        &mut self,
        read_hash: &mut dyn FnMut(u32) -> io::Result<u64>,
    ) -> io::Result<()> {
        while self.over_load() {
            self.split_one_bucket(read_hash)?;
        }
        Ok(())
    }

    /// Add one new bucket to the table.
    /// Buckets are split in order determined by the split point, not by how full they are.
    fn split_one_bucket(
        &mut self,
        read_hash: &mut dyn FnMut(u32) -> io::Result<u64>,
    ) -> io::Result<()> {
        let split_bucket = u64::from(self.hash_table_size_b - self.hash_table_size_a);
        let new_bucket = u64::from(self.hash_table_size_b);

        // Collect the chain's entries and their hashes before touching anything so an IO
        // error cannot leave the chain half drained.
        let mut entries: Vec<(u32, u64)> = Vec::new();
        let mut cur = BucketRef::Table(split_bucket);
        loop {
            let bucket = *self.bucket(cur);
            for slot in 0..RECORDS_PER_BUCKET {
                if bucket.fingerprints[slot] != 0 {
                    let file_index = bucket.file_index[slot];
                    entries.push((file_index, read_hash(file_index)?));
                }
            }
            if bucket.overflow_index == 0 {
                break;
            }
            cur = BucketRef::Overflow(bucket.overflow_index);
        }

        // Drain the chain.  Zeroed overflow buckets become recyclable through
        // first_empty_bucket_index.
        let mut cur = BucketRef::Table(split_bucket);
        loop {
            let bucket = self.bucket_mut(cur);
            let next = bucket.overflow_index;
            *bucket = FingerprintBucket::default();
            if next == 0 {
                break;
            }
            cur = BucketRef::Overflow(next);
        }

        let issued = self.hash_table.add_bucket();
        debug_assert_eq!(u64::from(issued), new_bucket);
        self.hash_table_size_b += 1;
        if u64::from(self.hash_table_size_b) == 2 * u64::from(self.hash_table_size_a) {
            // A full round of expansion is done, fold the doubled size into the base.
            // The fingerprint modulus is unchanged by this but recompute to keep it honest.
            self.hash_table_size_a = self.hash_table_size_b;
            self.recompute_fingerprint_mod();
        }

        for (file_index, hash) in entries {
            let (fingerprint, bin) = self.fingerprint_and_bin(hash);
            if bin != split_bucket && bin != new_bucket {
                panic!(
                    "record {} rehashed to bin {}, expected {} or {}",
                    file_index, bin, split_bucket, new_bucket
                );
            }
            self.place_entry(bin, fingerprint, file_index);
        }
        log::trace!(
            "split bin {} into {}, table now {} buckets",
            split_bucket,
            new_bucket,
            self.hash_table_size_b
        );
        Ok(())
    }

    /// Put an existing record's entry into the chain rooted at `bin`.
    /// Used when redistributing after a split, so no key comparison and no record count
    /// changes, the entries are known distinct live records.
    fn place_entry(&mut self, bin: u64, fingerprint: u32, file_index: u32) {
        let mut cur = BucketRef::Table(bin);
        loop {
            for slot in 0..RECORDS_PER_BUCKET {
                if self.bucket(cur).fingerprints[slot] == 0 {
                    let bucket = self.bucket_mut(cur);
                    bucket.fingerprints[slot] = fingerprint;
                    bucket.file_index[slot] = file_index;
                    return;
                }
            }
            let next = self.bucket(cur).overflow_index;
            if next == 0 {
                let new_index = self.overflow_buckets.first_empty_bucket_index();
                self.bucket_mut(cur).overflow_index = new_index;
                let bucket = self.bucket_mut(BucketRef::Overflow(new_index));
                bucket.fingerprints[0] = fingerprint;
                bucket.file_index[0] = file_index;
                return;
            }
            cur = BucketRef::Overflow(next);
        }
    }

    /// Largest divisor of the current size that still holds `new_num_records` at the load
    /// target.  Callers use this to pick a table size before rebuilding a smaller DB.
    pub fn shrink_size(&self, new_num_records: u32) -> u32 {
        let mut cur_size = self.hash_table_size_a;
        if self.hash_table_size_a != self.hash_table_size_b {
            // Use the doubled size, it is big enough to hold the current record load
            // without violating the load target.
            cur_size *= 2;
        }
        if new_num_records >= cur_size {
            // Can't shrink.
            return cur_size;
        }
        let min_size = (f64::from(new_num_records) / f64::from(self.max_load)).ceil() as u32;
        let mut divisor = 1;
        loop {
            let next = divisor * 2;
            if cur_size % next == 0 && cur_size / next >= min_size {
                divisor = next;
            } else {
                break;
            }
        }
        cur_size / divisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_file_access(_: u32) -> io::Result<bool> {
        panic!("probe should not read the file for this case");
    }

    #[test]
    fn test_fingerprint_never_zero() {
        let index = HashIndex::new(2, DEFAULT_MAX_LOAD);
        // A hash that is an exact multiple of the modulus would fingerprint to zero.
        let (fingerprint, _) = index.fingerprint_and_bin(0);
        assert_ne!(fingerprint, 0);
        let (fingerprint, _) = index.fingerprint_and_bin(u64::MAX);
        assert_ne!(fingerprint, 0);
    }

    #[test]
    fn test_fingerprint_mod_is_power_of_two_multiple() {
        let index = HashIndex::new(3, DEFAULT_MAX_LOAD);
        let modulus = index.fingerprint_mod;
        assert_eq!(modulus % 3, 0);
        assert!((modulus / 3).is_power_of_two());
        assert!(u64::from(modulus) * 2 > u64::from(u32::MAX));
    }

    #[test]
    fn test_claim_and_probe() {
        let mut index = HashIndex::new(2, DEFAULT_MAX_LOAD);
        let (fingerprint, bin) = index.fingerprint_and_bin(12345);
        let (probe, _) = index
            .probe(fingerprint, bin, &mut no_file_access)
            .unwrap();
        let loc = match probe {
            Probe::Vacant(loc) => loc,
            _ => panic!("expected a vacant slot in an empty index"),
        };
        assert_eq!(index.claim_slot(loc, fingerprint), 0);
        assert_eq!(index.num_records(), 1);

        let (probe, _) = index
            .probe(fingerprint, bin, &mut |file_index| {
                assert_eq!(file_index, 0);
                Ok(true)
            })
            .unwrap();
        assert!(matches!(probe, Probe::Found(_, 0)));
    }

    #[test]
    fn test_chain_extension() {
        let mut index = HashIndex::new(1, DEFAULT_MAX_LOAD);
        // With one bin everything chains off bin 0.
        for i in 0..(RECORDS_PER_BUCKET as u32 * 3) {
            let (fingerprint, bin) = index.fingerprint_and_bin(u64::from(i) + 1);
            assert_eq!(bin, 0);
            let (probe, _) = index
                .probe(fingerprint, bin, &mut |_| Ok(false))
                .unwrap();
            match probe {
                Probe::Vacant(loc) => {
                    index.claim_slot(loc, fingerprint);
                }
                Probe::Tail(tail) => {
                    index.extend_chain(tail, fingerprint);
                }
                Probe::Found(..) => panic!("nothing should match"),
            }
        }
        assert_eq!(index.num_records(), RECORDS_PER_BUCKET as u32 * 3);
        assert!(index.max_overflow_depth() >= 2);
    }

    #[test]
    fn test_shrink_size() {
        let mut index = HashIndex::new(64, DEFAULT_MAX_LOAD);
        // min size for 10 records at load 0.5 is 20, so 32 is the smallest divisor result.
        assert_eq!(index.shrink_size(10), 32);
        assert_eq!(index.shrink_size(1), 2);
        // Can't shrink below what the records need.
        assert_eq!(index.shrink_size(64), 64);
        // A partially split table reports the doubled base size.
        index.hash_table_size_b = 65;
        assert_eq!(index.shrink_size(1), 2);
        assert_eq!(index.shrink_size(128), 128);
    }
}
