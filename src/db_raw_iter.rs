//! Raw iterator over a data file.  This works without an index and can be used to open the
//! file directly, for instance to rebuild a database with different parameters.

use crate::db::data_header::DataHeader;
use crate::error::LoadHeaderError;
use std::fs::OpenOptions;
use std::io::{BufReader, Read};
use std::path::Path;

/// Iterate over a DB's key/value pairs in insert order.
/// This iterator is "raw", it does not use any index just the data file.  It reads through
/// its own file handle so it does not see records appended after it was opened.
pub struct DbRawIter {
    file: BufReader<std::fs::File>,
    key_size: usize,
    value_size: usize,
}

impl DbRawIter {
    /// Open the data file at path and produce an iterator over all the key/value pairs.
    /// The header is validated for the magic bytes and supplies the record sizes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadHeaderError> {
        let mut data_file = OpenOptions::new().read(true).open(path)?;
        let header = DataHeader::load_header(&mut data_file)?;
        Ok(Self {
            file: BufReader::new(data_file),
            key_size: header.key_size() as usize,
            value_size: header.value_size() as usize,
        })
    }
}

impl Iterator for DbRawIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let mut key = vec![0; self.key_size];
        self.file.read_exact(&mut key).ok()?;
        let mut value = vec![0; self.value_size];
        self.file.read_exact(&mut value).ok()?;
        Some((key, value))
    }
}
