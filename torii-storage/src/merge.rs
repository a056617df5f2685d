//! K-way merge over ordered record streams.
//!
//! Produces one strictly-ascending-by-key stream with duplicates
//! eliminated. When several inputs offer the same key, the record from
//! the later input (higher index) wins and the others advance past the
//! key; the engine passes inputs oldest-first so the newest write wins.
//! Tombstones pass through unfiltered; dropping them is the caller's
//! decision.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use torii_core::Record;

/// An ordered source feeding the merge: a mapped-table cursor, a memtable
/// snapshot, anything yielding records ascending by key.
pub type RecordIter = Box<dyn Iterator<Item = Record> + Send>;

struct HeapEntry {
    record: Record,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ascending by key; on equal keys the higher source ranks first
        // (wrapped in `Reverse`, the heap pops the minimum).
        match self.record.key().cmp(other.record.key()) {
            Ordering::Equal => other.source.cmp(&self.source),
            ordering => ordering,
        }
    }
}

/// Min-heap k-way merge; O(log K) per yielded record.
pub struct MergingIterator {
    inputs: Vec<RecordIter>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
}

impl MergingIterator {
    pub fn new(mut inputs: Vec<RecordIter>) -> Self {
        let mut heap = BinaryHeap::with_capacity(inputs.len());
        for (source, input) in inputs.iter_mut().enumerate() {
            if let Some(record) = input.next() {
                heap.push(Reverse(HeapEntry { record, source }));
            }
        }
        Self { inputs, heap }
    }

    fn advance(&mut self, source: usize) {
        if let Some(record) = self.inputs[source].next() {
            self.heap.push(Reverse(HeapEntry { record, source }));
        }
    }
}

impl Iterator for MergingIterator {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let Reverse(winner) = self.heap.pop()?;
        self.advance(winner.source);

        // Skip the shadowed versions of this key in every older input.
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.record.key() != winner.record.key() {
                break;
            }
            let source = entry.source;
            self.heap.pop();
            self.advance(source);
        }

        Some(winner.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(key: &str, value: &str, timestamp: i64) -> Record {
        Record::new(
            Bytes::copy_from_slice(key.as_bytes()),
            Bytes::copy_from_slice(value.as_bytes()),
            timestamp,
        )
    }

    fn input(records: Vec<Record>) -> RecordIter {
        Box::new(records.into_iter())
    }

    #[test]
    fn test_merges_ascending_without_duplicates() {
        let merged: Vec<Record> = MergingIterator::new(vec![
            input(vec![record("a", "1", 0), record("c", "3", 0)]),
            input(vec![record("b", "2", 0), record("c", "33", 1)]),
        ])
        .collect();

        let keys: Vec<Bytes> = merged.iter().map(|r| r.key().clone()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(merged[2].value().unwrap().as_ref(), b"33");
    }

    #[test]
    fn test_later_input_wins_three_ways() {
        let merged: Vec<Record> = MergingIterator::new(vec![
            input(vec![record("k", "oldest", 1)]),
            input(vec![record("k", "middle", 2)]),
            input(vec![record("k", "newest", 3)]),
        ])
        .collect();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value().unwrap().as_ref(), b"newest");
    }

    #[test]
    fn test_tombstones_pass_through() {
        let merged: Vec<Record> = MergingIterator::new(vec![
            input(vec![record("k", "live", 1)]),
            input(vec![Record::tombstone(Bytes::from_static(b"k"), 2)]),
        ])
        .collect();

        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_tombstone());
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(MergingIterator::new(Vec::new()).count(), 0);
        assert_eq!(
            MergingIterator::new(vec![input(Vec::new()), input(Vec::new())]).count(),
            0
        );
    }

    #[test]
    fn test_shadowed_inputs_keep_advancing() {
        let merged: Vec<Record> = MergingIterator::new(vec![
            input(vec![record("a", "old", 0), record("b", "old", 0)]),
            input(vec![record("a", "new", 1), record("b", "new", 1)]),
        ])
        .collect();

        assert_eq!(merged.len(), 2);
        for r in &merged {
            assert_eq!(r.value().unwrap().as_ref(), b"new");
        }
    }
}
