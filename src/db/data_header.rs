//! Define and manage the data file header.

use crate::error::LoadHeaderError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

/// Magic bytes opening every data file.
pub(crate) const MAGIC: &[u8; 3] = b"Ld2";

/// Bytes taken by the header, the magic plus the two size fields.
pub(crate) const HEADER_SIZE: u64 = 11;

/// Header for a data file: the magic bytes followed by the key and value sizes.
/// The size fields are stored little endian so files can move across architectures.
/// The header is immutable once written, everything after it is record data.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DataHeader {
    key_size: u32,
    value_size: u32,
}

impl DataHeader {
    pub fn new(key_size: u32, value_size: u32) -> Self {
        Self {
            key_size,
            value_size,
        }
    }

    /// Load a DataHeader from source.  Seeks to the beginning and leaves the source
    /// positioned after the header.
    pub fn load_header<R: Read + Seek>(source: &mut R) -> Result<Self, LoadHeaderError> {
        source.seek(SeekFrom::Start(0))?;
        let mut magic = [0_u8; 3];
        source.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(LoadHeaderError::InvalidMagic);
        }
        let key_size = source.read_u32::<LittleEndian>()?;
        let value_size = source.read_u32::<LittleEndian>()?;
        Ok(Self {
            key_size,
            value_size,
        })
    }

    /// Write this header at the start of sync.
    pub fn write_header<W: Write + Seek>(&self, sync: &mut W) -> Result<(), io::Error> {
        sync.seek(SeekFrom::Start(0))?;
        sync.write_all(MAGIC)?;
        sync.write_u32::<LittleEndian>(self.key_size)?;
        sync.write_u32::<LittleEndian>(self.value_size)?;
        Ok(())
    }

    /// Error if the sizes on file disagree with what the caller asked for.
    pub fn check_sizes(&self, key_size: u32, value_size: u32) -> Result<(), LoadHeaderError> {
        if self.key_size != key_size {
            return Err(LoadHeaderError::KeySizeMismatch {
                requested: key_size,
                found: self.key_size,
            });
        }
        if self.value_size != value_size {
            return Err(LoadHeaderError::ValueSizeMismatch {
                requested: value_size,
                found: self.value_size,
            });
        }
        Ok(())
    }

    pub fn key_size(&self) -> u32 {
        self.key_size
    }

    pub fn value_size(&self) -> u32 {
        self.value_size
    }

    /// Bytes taken by one record.
    pub fn record_size(&self) -> u32 {
        self.key_size + self.value_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_round_trip() {
        let mut buf = Cursor::new(Vec::new());
        DataHeader::new(4, 4).write_header(&mut buf).unwrap();
        assert_eq!(
            buf.get_ref().as_slice(),
            b"Ld2\x04\x00\x00\x00\x04\x00\x00\x00"
        );
        assert_eq!(buf.get_ref().len() as u64, HEADER_SIZE);

        let header = DataHeader::load_header(&mut buf).unwrap();
        assert_eq!(header.key_size(), 4);
        assert_eq!(header.value_size(), 4);
        assert_eq!(header.record_size(), 8);
        assert_eq!(buf.position(), HEADER_SIZE);
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = Cursor::new(b"xd2\x04\x00\x00\x00\x04\x00\x00\x00".to_vec());
        assert!(matches!(
            DataHeader::load_header(&mut buf),
            Err(LoadHeaderError::InvalidMagic)
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let header = DataHeader::new(8, 16);
        assert!(header.check_sizes(8, 16).is_ok());
        assert!(matches!(
            header.check_sizes(4, 16),
            Err(LoadHeaderError::KeySizeMismatch {
                requested: 4,
                found: 8
            })
        ));
        assert!(matches!(
            header.check_sizes(8, 4),
            Err(LoadHeaderError::ValueSizeMismatch {
                requested: 4,
                found: 16
            })
        ));
    }
}
