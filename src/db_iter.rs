//! Implements the record cursor for a DB.  The cursor holds nothing but the next record
//! number and is advanced through the owning handle, so iteration can interleave freely with
//! lookups and inserts.  This is ONLY appropriate for the single threaded core.

use crate::db::DbCore;
use crate::error::FetchError;
use crate::hasher::RecordHasher;

/// Iteration state over a DB's records in insertion order.
/// Create one with [`DbCore::iter`] and advance it with [`DbCore::next_record`].
#[derive(Debug, Clone, Copy)]
pub struct DbIter {
    next_record_index: u32,
}

impl<H> DbCore<H>
where
    H: RecordHasher + Default,
{
    /// Start an iteration over the records in insertion order.
    pub fn iter(&self) -> DbIter {
        DbIter {
            next_record_index: 0,
        }
    }

    /// Advance iter, reading the next record's key and value into the buffers.
    /// Returns `Ok(true)` when a record was read and `Ok(false)` at the end.
    /// Seeks to the record on every call so lookups and inserts between calls are safe;
    /// records appended while iterating are picked up.
    pub fn next_record(
        &mut self,
        iter: &mut DbIter,
        key_out: &mut [u8],
        value_out: &mut [u8],
    ) -> Result<bool, FetchError> {
        if key_out.len() != self.key_size {
            return Err(FetchError::InvalidKeyLength);
        }
        if value_out.len() != self.value_size {
            return Err(FetchError::InvalidValueLength);
        }
        if iter.next_record_index >= self.index.num_records() {
            return Ok(false);
        }
        self.data_file
            .read_record(iter.next_record_index, key_out, value_out)?;
        iter.next_record_index += 1;
        Ok(true)
    }
}
