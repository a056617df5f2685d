//! # ToriiKV Storage Engine
//!
//! LSM-structured local storage: an in-memory sorted buffer backed by
//! immutable on-disk sorted tables.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Write Path                             │
//! │                                                             │
//! │  upsert ──> MemTable ──(32MiB threshold)──> flush           │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      SSTable_<generation>   │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Read Path                              │
//! │                                                             │
//! │  range ──> flush ──> k-way merge over                       │
//! │            [oldest SSTable … newest SSTable, memtable]      │
//! │            (later input wins on equal keys)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All engine operations run inside a single exclusive critical section;
//! returned iterators co-own the mapped table data and stay valid after
//! the lock is released.

pub mod engine;
pub mod memtable;
pub mod merge;
pub mod sstable;

pub use engine::LsmEngine;
pub use memtable::MemTable;
pub use merge::{MergingIterator, RecordIter};
pub use sstable::{SsTable, SsTableWriter};
