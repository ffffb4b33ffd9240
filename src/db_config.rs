//! Define the configuration used to create a DB.

use crate::db::hash_index::DEFAULT_MAX_LOAD;
use crate::db::DbCore;
use crate::error::OpenError;
use crate::hasher::RecordHasher;
use std::path::{Path, PathBuf};

/// Configuration for a database.
#[derive(Clone, Debug)]
pub struct DbConfig {
    pub(crate) path: PathBuf,
    pub(crate) key_size: u32,
    pub(crate) value_size: u32,
    pub(crate) initial_buckets: u32,
    pub(crate) load_factor: f32,
    pub(crate) truncate: bool,
    pub(crate) allow_bucket_expansion: bool,
}

impl DbConfig {
    /// Create a new config for a database at path holding `key_size` byte keys and
    /// `value_size` byte values.
    /// Panics if either size is zero.
    pub fn new<P: Into<PathBuf>>(path: P, key_size: u32, value_size: u32) -> Self {
        if key_size == 0 || value_size == 0 {
            panic!("key and value sizes must be non-zero");
        }
        Self {
            path: path.into(),
            key_size,
            value_size,
            initial_buckets: 128,
            load_factor: DEFAULT_MAX_LOAD,
            truncate: false,
            allow_bucket_expansion: true,
        }
    }

    /// Path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// If the database exists then truncate it on open.
    /// This will rebuild the database with new parameters instead of using the old parameters.
    pub fn truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    /// Set the initial buckets in the hash table.  Initial capacity will be this times the
    /// records per bucket.  Ignored when opening a file that already has records, the table
    /// is then sized from the record count.
    pub fn set_initial_buckets(mut self, buckets: u32) -> Self {
        self.initial_buckets = buckets.max(1);
        self
    }

    /// Set the load factor, this determines the extra bucket capacity to maintain.
    pub fn set_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Keep the hash table at its open time size, absorbing extra load entirely in overflow
    /// chains.  Mostly for exercising long chains in tests.
    pub fn no_bucket_expansion(mut self) -> Self {
        self.allow_bucket_expansion = false;
        self
    }

    /// Consumes the config and builds a Db.
    pub fn build<H>(self) -> Result<DbCore<H>, OpenError>
    where
        H: RecordHasher + Default,
    {
        DbCore::open(self)
    }
}
