//! SSTable writer implementation

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use tracing::debug;

use torii_core::{Error, Record, Result};

use super::TOMBSTONE_LEN;

/// Streams an ordered record run to disk.
///
/// Records go to a scratch file next to the target; [`finish`] writes the
/// offset index and trailer, syncs, and renames the scratch into place.
/// If the writer is dropped before `finish` — including on any error
/// path — the scratch file is removed, so callers never observe a
/// partial table.
///
/// [`finish`]: SsTableWriter::finish
pub struct SsTableWriter {
    target: PathBuf,
    scratch: PathBuf,
    out: BufWriter<File>,
    offsets: Vec<u64>,
    position: u64,
    last_key: Option<Bytes>,
    finished: bool,
}

impl SsTableWriter {
    /// Open a writer that will materialize at `target` on `finish`.
    pub fn create(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let scratch = scratch_path(&target);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&scratch)?;

        Ok(Self {
            target,
            scratch,
            out: BufWriter::new(file),
            offsets: Vec::new(),
            position: 0,
            last_key: None,
            finished: false,
        })
    }

    /// Append the next record. Keys must arrive strictly ascending.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        if let Some(last) = &self.last_key {
            if record.key() <= last {
                return Err(Error::table(format!(
                    "record keys out of order in {:?}",
                    self.target
                )));
            }
        }

        self.offsets.push(self.position);

        let key = record.key();
        self.out.write_u32::<BigEndian>(key.len() as u32)?;
        self.out.write_all(key)?;
        match record.value() {
            Some(value) => {
                self.out.write_i32::<BigEndian>(value.len() as i32)?;
                self.out.write_all(value)?;
                self.position += 4 + key.len() as u64 + 4 + value.len() as u64 + 8;
            }
            None => {
                self.out.write_i32::<BigEndian>(TOMBSTONE_LEN)?;
                self.position += 4 + key.len() as u64 + 4 + 8;
            }
        }
        self.out.write_i64::<BigEndian>(record.timestamp())?;

        self.last_key = Some(key.clone());
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Write the index and trailer, sync, and move the file into place.
    pub fn finish(mut self) -> Result<PathBuf> {
        let index_offset = self.position;
        for offset in &self.offsets {
            self.out.write_u64::<BigEndian>(*offset)?;
        }
        self.out.write_u64::<BigEndian>(index_offset)?;

        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        fs::rename(&self.scratch, &self.target)?;
        self.finished = true;

        debug!(path = ?self.target, entries = self.offsets.len(), "wrote SSTable");
        Ok(self.target.clone())
    }
}

impl Drop for SsTableWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = fs::remove_file(&self.scratch);
        }
    }
}

fn scratch_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(super::SCRATCH_EXTENSION);
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(key: &[u8], value: &[u8]) -> Record {
        Record::new(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value), 1)
    }

    #[test]
    fn test_rejects_out_of_order_keys() {
        let dir = TempDir::new().unwrap();
        let mut writer = SsTableWriter::create(dir.path().join("SSTable_0")).unwrap();

        writer.append(&record(b"b", b"1")).unwrap();
        assert!(writer.append(&record(b"a", b"2")).is_err());
        assert!(writer.append(&record(b"b", b"2")).is_err());
    }

    #[test]
    fn test_dropped_writer_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("SSTable_0");
        {
            let mut writer = SsTableWriter::create(&target).unwrap();
            writer.append(&record(b"a", b"1")).unwrap();
            // dropped without finish
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(!target.exists());
    }

    #[test]
    fn test_finish_renames_scratch() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("SSTable_0");
        let mut writer = SsTableWriter::create(&target).unwrap();
        writer.append(&record(b"a", b"1")).unwrap();
        writer.finish().unwrap();

        assert!(target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
