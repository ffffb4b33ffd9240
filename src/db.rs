//! Main module for the DB.  This implements the core sync single threaded access to the DB.

use crate::db::data_file::DataFile;
use crate::db::hash_index::{HashIndex, Probe};
use crate::db::page_manager::RECORDS_PER_BUCKET;
use crate::db_config::DbConfig;
use crate::db_raw_iter::DbRawIter;
use crate::error::{FetchError, InsertError, LoadHeaderError, OpenError};
use crate::hasher::{RecordHasher, XxHasher, KEY_HASH_SEED};
use std::io;

pub(crate) mod data_file;
pub(crate) mod data_header;
pub(crate) mod hash_index;
pub(crate) mod page_manager;

/// An instance of a DB.
/// Consists of an append only data file of fixed width records and an in-memory fingerprint
/// hash index that is rebuilt from the data file on open.  Keys and values are opaque byte
/// slices whose lengths must match the sizes the DB was created with.
/// Dropping the handle closes the data file, anything not synced is left to the OS.
pub struct DbCore<H = XxHasher>
where
    H: RecordHasher + Default,
{
    pub(crate) data_file: DataFile,
    pub(crate) index: HashIndex,
    pub(crate) key_size: usize,
    pub(crate) value_size: usize,
    hasher: H,
    // Shared buffer for key reads during probes, avoids allocating per lookup.
    scratch: Vec<u8>,
    config: DbConfig,
}

impl<H> DbCore<H>
where
    H: RecordHasher + Default,
{
    /// Open a new or reopen an existing database.
    /// An existing file has its header validated against the configured sizes and its records
    /// replayed into a fresh index sized for the record count at the configured load factor.
    pub fn open(config: DbConfig) -> Result<Self, OpenError> {
        let mut data_file = DataFile::open(&config).map_err(OpenError::DataFileOpen)?;
        let records_in_file = data_file.num_records().map_err(OpenError::DataFileOpen)?;
        let starting_buckets = if records_in_file == 0 {
            config.initial_buckets
        } else {
            let min_table_records =
                (records_in_file as f64 / f64::from(config.load_factor)).ceil();
            (min_table_records / RECORDS_PER_BUCKET as f64).ceil() as u32
        };
        let mut db = Self {
            data_file,
            index: HashIndex::new(starting_buckets, config.load_factor),
            hasher: H::default(),
            key_size: config.key_size as usize,
            value_size: config.value_size as usize,
            scratch: vec![0; config.key_size as usize],
            config,
        };
        db.rebuild_index(records_in_file)
            .map_err(OpenError::Rebuild)?;
        Ok(db)
    }

    /// Fetch the value stored at key into value_out.
    /// Returns [`FetchError::NotFound`] if the key is absent.
    pub fn get(&mut self, key: &[u8], value_out: &mut [u8]) -> Result<(), FetchError> {
        if key.len() != self.key_size {
            return Err(FetchError::InvalidKeyLength);
        }
        if value_out.len() != self.value_size {
            return Err(FetchError::InvalidValueLength);
        }
        let hash = self.hasher.hash(key, KEY_HASH_SEED);
        let (fingerprint, bin) = self.index.fingerprint_and_bin(hash);
        let (probe, _) = Self::probe_chain(
            &mut self.index,
            &mut self.data_file,
            &mut self.scratch,
            key,
            fingerprint,
            bin,
        )?;
        match probe {
            Probe::Found(_, file_index) => {
                self.data_file.read_value(file_index, value_out)?;
                Ok(())
            }
            Probe::Vacant(_) | Probe::Tail(_) => Err(FetchError::NotFound),
        }
    }

    /// True if the database contains key.
    pub fn contains_key(&mut self, key: &[u8]) -> Result<bool, FetchError> {
        if key.len() != self.key_size {
            return Err(FetchError::InvalidKeyLength);
        }
        let hash = self.hasher.hash(key, KEY_HASH_SEED);
        let (fingerprint, bin) = self.index.fingerprint_and_bin(hash);
        let (probe, _) = Self::probe_chain(
            &mut self.index,
            &mut self.data_file,
            &mut self.scratch,
            key,
            fingerprint,
            bin,
        )?;
        Ok(matches!(probe, Probe::Found(..)))
    }

    /// Insert or overwrite the value for key.
    /// A new key claims an index slot and appends its record to the data file; an existing
    /// key has its value overwritten in place so the record count does not change.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), InsertError> {
        if key.len() != self.key_size {
            return Err(InsertError::InvalidKeyLength);
        }
        if value.len() != self.value_size {
            return Err(InsertError::InvalidValueLength);
        }
        let hash = self.hasher.hash(key, KEY_HASH_SEED);
        let (fingerprint, bin) = self.index.fingerprint_and_bin(hash);
        let (probe, depth) = Self::probe_chain(
            &mut self.index,
            &mut self.data_file,
            &mut self.scratch,
            key,
            fingerprint,
            bin,
        )?;
        match probe {
            Probe::Found(_, file_index) => {
                self.data_file.write_value(file_index, value)?;
            }
            Probe::Vacant(loc) => {
                let file_index = self.index.claim_slot(loc, fingerprint);
                self.data_file.append_record(file_index, key, value)?;
            }
            Probe::Tail(tail) => {
                self.index.note_overflow_depth(depth + 1);
                let file_index = self.index.extend_chain(tail, fingerprint);
                self.data_file.append_record(file_index, key, value)?;
            }
        }
        if self.config.allow_bucket_expansion {
            self.expand_if_needed()?;
        }
        Ok(())
    }

    /// Return the number of records in the DB.
    pub fn num_records(&self) -> u32 {
        self.index.num_records()
    }

    /// Is the DB empty?
    pub fn is_empty(&self) -> bool {
        self.num_records() == 0
    }

    /// Current hash table size in buckets, including any partially completed expansion round.
    pub fn current_size(&self) -> u32 {
        self.index.current_size()
    }

    /// Largest table size that divides the current size and still holds `new_num_records` at
    /// the configured load factor.  For callers planning to rebuild a smaller database.
    pub fn shrink_size(&self, new_num_records: u32) -> u32 {
        self.index.shrink_size(new_num_records)
    }

    /// Deepest overflow chain walked so far, a diagnostic for how collision heavy the table is.
    pub fn max_overflow_depth(&self) -> u32 {
        self.index.max_overflow_depth()
    }

    /// Sync the data file to disk.  Records synced here stay readable after a crash.
    pub fn sync(&mut self) -> Result<(), io::Error> {
        self.data_file.sync_all()
    }

    /// Return an iterator over the key values in insertion order.
    /// Note this iterator only uses the data file not the index and opens its own file handle,
    /// so it will not reflect records appended after it was created.
    pub fn raw_iter(&self) -> Result<DbRawIter, LoadHeaderError> {
        DbRawIter::open(&self.config.path)
    }

    /// Replay every record in the file into the index.
    /// Each read seeks to its record explicitly so key comparisons made by the probe cannot
    /// disturb the walk.  Claimed slots point records at their own positions.
    fn rebuild_index(&mut self, records_in_file: u64) -> io::Result<()> {
        let mut key = vec![0; self.key_size];
        for record in 0..records_in_file as u32 {
            self.data_file.read_key(record, &mut key)?;
            let hash = self.hasher.hash(&key, KEY_HASH_SEED);
            let (fingerprint, bin) = self.index.fingerprint_and_bin(hash);
            let (probe, depth) = Self::probe_chain(
                &mut self.index,
                &mut self.data_file,
                &mut self.scratch,
                &key,
                fingerprint,
                bin,
            )?;
            match probe {
                // A duplicate key keeps its first record number.  Inserts overwrite values
                // in place so duplicates only show up in files written by something else.
                Probe::Found(..) => {}
                Probe::Vacant(loc) => {
                    self.index.claim_slot(loc, fingerprint);
                }
                Probe::Tail(tail) => {
                    self.index.note_overflow_depth(depth + 1);
                    self.index.extend_chain(tail, fingerprint);
                }
            }
        }
        if records_in_file > 0 {
            log::debug!("rebuilt index for {} records", records_in_file);
        }
        Ok(())
    }

    /// Walk the bucket chain for fingerprint, comparing stored keys through the data file.
    /// Free function over the split borrows so callers can keep using their other fields.
    fn probe_chain(
        index: &mut HashIndex,
        data_file: &mut DataFile,
        scratch: &mut Vec<u8>,
        key: &[u8],
        fingerprint: u32,
        bin: u64,
    ) -> io::Result<(Probe, u32)> {
        let mut key_matches = |file_index: u32| -> io::Result<bool> {
            data_file.read_key(file_index, scratch)?;
            Ok(&scratch[..] == key)
        };
        index.probe(fingerprint, bin, &mut key_matches)
    }

    fn expand_if_needed(&mut self) -> Result<(), InsertError> {
        let Self {
            index,
            data_file,
            scratch,
            hasher,
            ..
        } = self;
        let mut read_hash = |file_index: u32| -> io::Result<u64> {
            data_file.read_key(file_index, scratch)?;
            Ok(hasher.hash(scratch, KEY_HASH_SEED))
        };
        index.expand(&mut read_hash)?;
        Ok(())
    }
}
