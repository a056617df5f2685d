//! # LSM Engine
//!
//! Owns the memtable and the ordered SSTable list behind one exclusive
//! lock. Every operation — `upsert`, `range`, `compact`, `close` — runs
//! inside a single critical section; there is no finer-grained
//! synchronization and no suspension while the lock is held.
//!
//! `range` flushes buffered data first, so the iterator it returns never
//! has to synchronize with concurrent mutators: it reads only immutable
//! tables (whose mappings it co-owns) plus an empty memtable snapshot.

use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use torii_core::{Error, Record, Result, StoreConfig};

use crate::memtable::MemTable;
use crate::merge::{MergingIterator, RecordIter};
use crate::sstable::{generation_name, SsTable, SsTableWriter};

pub struct LsmEngine {
    config: StoreConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    memtable: MemTable,
    tables: Vec<SsTable>,
    mem_bytes: usize,
    closed: bool,
}

impl LsmEngine {
    /// Open the engine over `config.data_dir`, creating the directory if
    /// needed and loading existing tables oldest-first.
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let tables = SsTable::load_dir(&config.data_dir)?;
        let records: usize = tables.iter().map(SsTable::record_count).sum();
        info!(
            dir = ?config.data_dir,
            tables = tables.len(),
            records,
            "opened LSM engine"
        );

        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                memtable: MemTable::new(),
                tables,
                mem_bytes: 0,
                closed: false,
            }),
        })
    }

    /// Insert a record, flushing first if the buffered size would exceed
    /// the memtable threshold.
    pub fn upsert(&self, record: Record) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;

        let size = record.accounted_size();
        if inner.mem_bytes + size > self.config.memtable_limit {
            self.flush_locked(&mut inner)?;
        }
        inner.mem_bytes += size;
        inner.memtable.insert(record);
        Ok(())
    }

    /// Merged ascending iterator over `from <= key < to` across all
    /// tables and the memtable; either bound may be absent. Tombstones
    /// are included; filtering is the caller's decision.
    pub fn range(&self, from: Option<Bytes>, to: Option<Bytes>) -> Result<MergingIterator> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        self.flush_locked(&mut inner)?;

        // Oldest table first, memtable last: the merge's later-input-wins
        // rule then resolves duplicates to the newest write.
        let mut inputs: Vec<RecordIter> = inner
            .tables
            .iter()
            .map(|table| Box::new(table.range(from.as_deref(), to.clone())) as RecordIter)
            .collect();
        inputs.push(Box::new(
            inner
                .memtable
                .range_snapshot(from.as_ref(), to.as_ref())
                .into_iter(),
        ));

        Ok(MergingIterator::new(inputs))
    }

    /// Rewrite all tables as a single deduplicated table and delete the
    /// previous files. An empty merged stream produces no file.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        self.flush_locked(&mut inner)?;

        if inner.tables.is_empty() {
            return Ok(());
        }

        let inputs: Vec<RecordIter> = inner
            .tables
            .iter()
            .map(|table| Box::new(table.range(None, None)) as RecordIter)
            .collect();

        let target = self.generation_path(0);
        let mut writer = SsTableWriter::create(&target)?;
        for record in MergingIterator::new(inputs) {
            writer.append(&record)?;
        }

        let old_paths: Vec<PathBuf> = inner
            .tables
            .iter()
            .map(|table| table.path().to_path_buf())
            .collect();
        inner.tables.clear();
        for path in &old_paths {
            fs::remove_file(path)?;
        }

        if writer.is_empty() {
            info!("compaction produced no output");
            return Ok(());
        }

        let entries = writer.entry_count();
        writer.finish()?;
        inner.tables.push(SsTable::open(&target)?);
        info!(inputs = old_paths.len(), entries, "compaction complete");
        Ok(())
    }

    /// Flush buffered data and release all tables. Further operations
    /// fail.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        self.flush_locked(&mut inner)?;
        inner.closed = true;
        inner.tables.clear();
        info!("closed LSM engine");
        Ok(())
    }

    pub fn table_count(&self) -> usize {
        self.inner.lock().tables.len()
    }

    fn flush_locked(&self, inner: &mut Inner) -> Result<()> {
        if inner.memtable.is_empty() {
            inner.mem_bytes = 0;
            return Ok(());
        }

        let path = self.generation_path(inner.tables.len());
        debug!(path = ?path, entries = inner.memtable.len(), "flushing memtable");

        let mut writer = SsTableWriter::create(&path)?;
        for record in inner.memtable.snapshot() {
            writer.append(&record)?;
        }
        writer.finish()?;

        inner.tables.push(SsTable::open(&path)?);
        inner.memtable = MemTable::new();
        inner.mem_bytes = 0;
        Ok(())
    }

    fn generation_path(&self, generation: usize) -> PathBuf {
        self.config.data_dir.join(generation_name(generation))
    }
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::engine("engine is closed"))
        } else {
            Ok(())
        }
    }
}
