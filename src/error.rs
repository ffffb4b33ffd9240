//! Implements the errors for the DB.

use std::error::Error;
use std::fmt;
use std::io;

/// Error on loading or validating a data file header.
#[derive(Debug)]
pub enum LoadHeaderError {
    /// The magic bytes at the start of the file were wrong, corrupted or not a data file.
    InvalidMagic,
    /// The key size in the file header does not match the requested key size.
    KeySizeMismatch {
        /// Key size the caller asked for.
        requested: u32,
        /// Key size recorded in the file header.
        found: u32,
    },
    /// The value size in the file header does not match the requested value size.
    ValueSizeMismatch {
        /// Value size the caller asked for.
        requested: u32,
        /// Value size recorded in the file header.
        found: u32,
    },
    /// The file body is not a whole number of records.
    PartialRecord {
        /// Length of the file in bytes.
        file_size: u64,
        /// Bytes per record for the requested sizes.
        record_size: u32,
    },
    /// An underlying IO error while loading the header.
    IO(io::Error),
}

impl Error for LoadHeaderError {}

impl fmt::Display for LoadHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::InvalidMagic => write!(f, "magic bytes not found at start of file header"),
            Self::KeySizeMismatch { requested, found } => write!(
                f,
                "requested key size of {} does not match size of {} in file header",
                requested, found
            ),
            Self::ValueSizeMismatch { requested, found } => write!(
                f,
                "requested value size of {} does not match size of {} in file header",
                requested, found
            ),
            Self::PartialRecord {
                file_size,
                record_size,
            } => write!(
                f,
                "file of {} bytes does not contain a whole number of {} byte records",
                file_size, record_size
            ),
            Self::IO(e) => write!(f, "io: {}", e),
        }
    }
}

impl From<io::Error> for LoadHeaderError {
    fn from(io_err: io::Error) -> Self {
        Self::IO(io_err)
    }
}

/// Error on opening a DB.
#[derive(Debug)]
pub enum OpenError {
    /// Error opening or validating the data file.
    DataFileOpen(LoadHeaderError),
    /// Error replaying the data file into the index.
    Rebuild(io::Error),
}

impl Error for OpenError {}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::DataFileOpen(e) => write!(f, "data open failed: {}", e),
            Self::Rebuild(e) => write!(f, "index rebuild failed: {}", e),
        }
    }
}

/// Error on reading a DB record.
#[derive(Debug)]
pub enum FetchError {
    /// Requested key was not found.
    NotFound,
    /// The key buffer does not match the DB's key size.
    InvalidKeyLength,
    /// The value buffer does not match the DB's value size.
    InvalidValueLength,
    /// An IO error seeking or reading the data file.
    IO(io::Error),
}

impl Error for FetchError {}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::NotFound => write!(f, "not found"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidValueLength => write!(f, "invalid value length"),
            Self::IO(e) => write!(f, "io: {}", e),
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(io_err: io::Error) -> Self {
        Self::IO(io_err)
    }
}

/// Error on inserting a DB record.
#[derive(Debug)]
pub enum InsertError {
    /// The key buffer does not match the DB's key size.
    InvalidKeyLength,
    /// The value buffer does not match the DB's value size.
    InvalidValueLength,
    /// The file end is not where the index says the next record belongs.
    /// Indicates file corruption or that something else modified the file.
    AppendDesync {
        /// Offset the record was indexed at.
        expected: u64,
        /// Actual end of the file.
        found: u64,
    },
    /// An IO error seeking, reading or writing the data file.
    IO(io::Error),
}

impl Error for InsertError {}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidValueLength => write!(f, "invalid value length"),
            Self::AppendDesync { expected, found } => write!(
                f,
                "file end {} does not match indexed record offset {}",
                found, expected
            ),
            Self::IO(e) => write!(f, "io: {}", e),
        }
    }
}

impl From<io::Error> for InsertError {
    fn from(io_err: io::Error) -> Self {
        Self::IO(io_err)
    }
}
