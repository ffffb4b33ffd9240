#![deny(missing_docs)]

//! Crate to implement a simple key/value data store for fixed width keys and values.
//! This provides efficient lookups by key but no sorting.
//! It uses an append only data file (a header followed by a dense array of records) with an
//! in-memory index.  The index is a fingerprint hash table: each bucket holds a handful of
//! 32 bit fingerprint/record number pairs plus a handle into a chain of overflow buckets.
//! Bin selection uses the linear hashing algorithm (https://en.wikipedia.org/wiki/Linear_hashing)
//! so the table can grow one bucket at a time while keys keep finding their records.
//! The index is never written to disk, it is rebuilt from the data file on open.
//!
//! The hasher is pluggable (see [`hasher::RecordHasher`]); the default is a seeded 64 bit
//! xxHash.  Whatever hasher is used must be deterministic for a given key so that lookups,
//! rebuilds and bucket splits all agree on where a record lives.
//!
//! It is possible to iterate the data without the index (see [`db_raw_iter::DbRawIter`]).

pub mod db;
pub mod db_config;
pub mod db_iter;
pub mod db_raw_iter;
pub mod error;
pub mod hasher;
