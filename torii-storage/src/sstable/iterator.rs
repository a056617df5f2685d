//! SSTable range iterator

use std::sync::Arc;

use bytes::Bytes;
use torii_core::Record;

use super::reader::decode_record;

/// Ascending cursor over one table's records, bounded above by an
/// exclusive key. Keys and values are zero-copy slices of the table's
/// mapping, which the iterator co-owns.
pub struct TableIter {
    data: Bytes,
    index: Arc<Vec<u64>>,
    next: usize,
    to: Option<Bytes>,
}

impl TableIter {
    pub(crate) fn new(data: Bytes, index: Arc<Vec<u64>>, start: usize, to: Option<Bytes>) -> Self {
        Self {
            data,
            index,
            next: start,
            to,
        }
    }
}

impl Iterator for TableIter {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let offset = *self.index.get(self.next)? as usize;
        let record = decode_record(&self.data, offset);

        if let Some(to) = &self.to {
            if record.key() >= to {
                self.next = self.index.len();
                return None;
            }
        }

        self.next += 1;
        Some(record)
    }
}
