//! Record addressed access to the append only data file.

use crate::db::data_header::{DataHeader, HEADER_SIZE};
use crate::db_config::DbConfig;
use crate::error::{InsertError, LoadHeaderError};
use std::fs::{File, OpenOptions};
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

/// Owns the data file and translates record numbers to byte offsets.
/// Record `n` lives at `HEADER_SIZE + n * record_size`.
pub(crate) struct DataFile {
    file: File,
    key_size: usize,
    value_size: usize,
    record_size: u64,
}

impl DataFile {
    /// Open or create the data file for config, writing a fresh header or validating the
    /// existing one against the configured key and value sizes.
    pub fn open(config: &DbConfig) -> Result<Self, LoadHeaderError> {
        if config.truncate {
            // truncate is incompatible with the plain open below so truncate first.
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&config.path)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&config.path)?;
        let file_end = file.seek(SeekFrom::End(0))?;

        let header = if file_end < HEADER_SIZE {
            let header = DataHeader::new(config.key_size, config.value_size);
            header.write_header(&mut file)?;
            header
        } else {
            let header = DataHeader::load_header(&mut file)?;
            if let Err(err) = header.check_sizes(config.key_size, config.value_size) {
                log::warn!("data file {:?} rejected: {}", config.path, err);
                return Err(err);
            }
            header
        };
        Ok(Self {
            file,
            key_size: header.key_size() as usize,
            value_size: header.value_size() as usize,
            record_size: u64::from(header.record_size()),
        })
    }

    /// Records currently in the file, erroring when a partial record trails.
    pub fn num_records(&mut self) -> Result<u64, LoadHeaderError> {
        let file_size = self.file.seek(SeekFrom::End(0))?;
        let body = file_size - HEADER_SIZE;
        if body % self.record_size != 0 {
            return Err(LoadHeaderError::PartialRecord {
                file_size,
                record_size: self.record_size as u32,
            });
        }
        Ok(body / self.record_size)
    }

    fn record_pos(&self, index: u32) -> u64 {
        HEADER_SIZE + u64::from(index) * self.record_size
    }

    /// Read the key of record `index` into `buf`.
    pub fn read_key(&mut self, index: u32, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.record_pos(index)))?;
        self.file.read_exact(&mut buf[..self.key_size])
    }

    /// Read the value of record `index` into `buf`.
    pub fn read_value(&mut self, index: u32, buf: &mut [u8]) -> io::Result<()> {
        let pos = self.record_pos(index) + self.key_size as u64;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.read_exact(&mut buf[..self.value_size])
    }

    /// Read the whole record at `index` into the two buffers.
    pub fn read_record(&mut self, index: u32, key: &mut [u8], value: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(self.record_pos(index)))?;
        self.file.read_exact(&mut key[..self.key_size])?;
        self.file.read_exact(&mut value[..self.value_size])
    }

    /// Overwrite the value of record `index` in place.
    pub fn write_value(&mut self, index: u32, value: &[u8]) -> io::Result<()> {
        let pos = self.record_pos(index) + self.key_size as u64;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(value)
    }

    /// Append record `index` to the file.  The file end must sit exactly where the index
    /// says the record belongs, anything else means the index and file have diverged.
    pub fn append_record(&mut self, index: u32, key: &[u8], value: &[u8]) -> Result<(), InsertError> {
        let expected = self.record_pos(index);
        let end = self.file.seek(SeekFrom::End(0))?;
        if end != expected {
            return Err(InsertError::AppendDesync {
                expected,
                found: end,
            });
        }
        self.file.write_all(key)?;
        self.file.write_all(value)?;
        Ok(())
    }

    /// Sync file contents to disk.
    pub fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}
