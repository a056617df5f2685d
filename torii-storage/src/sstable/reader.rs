//! SSTable reader implementation

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use memmap2::MmapOptions;
use tracing::warn;

use torii_core::{Error, Record, Result};

use super::{TableIter, FILE_PREFIX, SCRATCH_EXTENSION, TOMBSTONE_LEN};

/// An open, memory-mapped SSTable.
///
/// The mapping is wrapped in a shared zero-copy buffer, so range
/// iterators co-own it and stay valid even if the table is closed or its
/// file unlinked while they are outstanding.
pub struct SsTable {
    path: PathBuf,
    data: Bytes,
    index: Arc<Vec<u64>>,
}

impl SsTable {
    /// Open a table by memory-mapping it and parsing the offset index.
    ///
    /// The record framing is validated once here; iteration afterwards is
    /// infallible.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_size = file.metadata()?.len() as usize;

        if file_size < 8 {
            return Err(Error::table(format!("{path:?} too small for a trailer")));
        }

        let mmap = unsafe {
            MmapOptions::new().map(&file).map_err(|e| Error::Io {
                message: format!("failed to mmap {path:?}"),
                source: e,
            })?
        };
        let data = Bytes::from_owner(mmap);

        let index_offset = BigEndian::read_u64(&data[file_size - 8..]) as usize;
        if index_offset > file_size - 8 || (file_size - 8 - index_offset) % 8 != 0 {
            return Err(Error::table(format!("{path:?} has a malformed trailer")));
        }

        let index: Vec<u64> = data[index_offset..file_size - 8]
            .chunks_exact(8)
            .map(BigEndian::read_u64)
            .collect();

        validate_records(&data, &index, index_offset)
            .map_err(|message| Error::table(format!("{path:?}: {message}")))?;

        Ok(Self {
            path,
            data,
            index: Arc::new(index),
        })
    }

    /// Open every table in `dir`, oldest first (ascending file name).
    ///
    /// Leftover scratch files from an interrupted flush or compaction are
    /// removed on the way.
    pub fn load_dir(dir: &Path) -> Result<Vec<SsTable>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(SCRATCH_EXTENSION) {
                warn!(file = %name, "removing leftover scratch file");
                fs::remove_file(entry.path())?;
            } else if name.starts_with(FILE_PREFIX) {
                names.push(name);
            }
        }
        names.sort();

        names
            .into_iter()
            .map(|name| SsTable::open(dir.join(name)))
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_count(&self) -> usize {
        self.index.len()
    }

    /// Lazy ascending iterator over records with `from <= key < to`;
    /// either bound may be absent. The lower bound is located by binary
    /// search over the index; advancing does not allocate per record.
    pub fn range(&self, from: Option<&[u8]>, to: Option<Bytes>) -> TableIter {
        let start = match from {
            Some(key) => self
                .index
                .partition_point(|&offset| self.key_at(offset as usize) < key),
            None => 0,
        };
        TableIter::new(self.data.clone(), Arc::clone(&self.index), start, to)
    }

    fn key_at(&self, offset: usize) -> &[u8] {
        let key_len = BigEndian::read_u32(&self.data[offset..]) as usize;
        &self.data[offset + 4..offset + 4 + key_len]
    }
}

/// Decode the record starting at `offset`. Framing was validated at open,
/// so slicing cannot go out of bounds; the key and value share the mapped
/// buffer.
pub(crate) fn decode_record(data: &Bytes, offset: usize) -> Record {
    let key_len = BigEndian::read_u32(&data[offset..]) as usize;
    let key_start = offset + 4;
    let key = data.slice(key_start..key_start + key_len);

    let value_len = BigEndian::read_i32(&data[key_start + key_len..]);
    let value_start = key_start + key_len + 4;
    if value_len == TOMBSTONE_LEN {
        let timestamp = BigEndian::read_i64(&data[value_start..]);
        Record::tombstone(key, timestamp)
    } else {
        let value_end = value_start + value_len as usize;
        let value = data.slice(value_start..value_end);
        let timestamp = BigEndian::read_i64(&data[value_end..]);
        Record::new(key, value, timestamp)
    }
}

/// Check that every index entry frames a whole record and that records
/// tile the data section exactly.
fn validate_records(
    data: &[u8],
    index: &[u64],
    index_offset: usize,
) -> std::result::Result<(), String> {
    let mut expected = 0usize;
    for (i, &offset) in index.iter().enumerate() {
        let offset = offset as usize;
        if offset != expected {
            return Err(format!("record {i} does not start at offset {expected}"));
        }

        let need = |end: usize| -> std::result::Result<(), String> {
            if end > index_offset {
                Err(format!("record {i} overruns the index section"))
            } else {
                Ok(())
            }
        };

        need(offset + 4)?;
        let key_len = BigEndian::read_u32(&data[offset..]) as usize;
        need(offset + 4 + key_len + 4)?;

        let value_len = BigEndian::read_i32(&data[offset + 4 + key_len..]);
        let value_len = match value_len {
            TOMBSTONE_LEN => 0,
            n if n >= 0 => n as usize,
            n => return Err(format!("record {i} has invalid value length {n}")),
        };

        expected = offset + 4 + key_len + 4 + value_len + 8;
        need(expected)?;
    }

    if expected != index_offset {
        return Err("records do not tile the data section".to_string());
    }
    Ok(())
}
