//! In-memory sorted buffer of pending writes.
//!
//! Keyed by raw record key; insertion overwrites, iteration is ascending.
//! The engine owns the memtable behind its exclusive lock.

use std::ops::Bound;

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;
use torii_core::Record;

pub struct MemTable {
    map: SkipMap<Bytes, Record>,
}

impl MemTable {
    pub fn new() -> Self {
        Self { map: SkipMap::new() }
    }

    /// Insert a record, replacing any previous record for the same key.
    pub fn insert(&self, record: Record) {
        self.map.insert(record.key().clone(), record);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All records in ascending key order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.map.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Records with `from <= key < to` in ascending key order; either
    /// bound may be absent.
    pub fn range_snapshot(&self, from: Option<&Bytes>, to: Option<&Bytes>) -> Vec<Record> {
        let lower = from.map_or(Bound::Unbounded, |key| Bound::Included(key.clone()));
        let upper = to.map_or(Bound::Unbounded, |key| Bound::Excluded(key.clone()));
        self.map
            .range((lower, upper))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, value: &str, timestamp: i64) -> Record {
        Record::new(
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
            timestamp,
        )
    }

    #[test]
    fn test_insert_overwrites() {
        let table = MemTable::new();
        table.insert(record("k", "old", 1));
        table.insert(record("k", "new", 2));

        assert_eq!(table.len(), 1);
        let snapshot = table.snapshot();
        assert_eq!(snapshot[0].value().unwrap().as_ref(), b"new");
        assert_eq!(snapshot[0].timestamp(), 2);
    }

    #[test]
    fn test_snapshot_is_ascending() {
        let table = MemTable::new();
        table.insert(record("b", "2", 0));
        table.insert(record("a", "1", 0));
        table.insert(record("c", "3", 0));

        let keys: Vec<_> = table
            .snapshot()
            .iter()
            .map(|r| r.key().clone())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_range_snapshot_bounds() {
        let table = MemTable::new();
        for key in ["a", "b", "c", "d"] {
            table.insert(record(key, key, 0));
        }

        let from = Bytes::from_static(b"b");
        let to = Bytes::from_static(b"d");
        let hits = table.range_snapshot(Some(&from), Some(&to));
        let keys: Vec<_> = hits.iter().map(|r| r.key().clone()).collect();
        assert_eq!(keys, vec!["b", "c"]);

        assert_eq!(table.range_snapshot(None, None).len(), 4);
    }
}
