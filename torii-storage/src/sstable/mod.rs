//! SSTables are immutable, sorted on-disk runs of records, produced by a
//! single memtable flush or a compaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SSTable File Structure                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                     Records                         │    │
//! │  │  key_len:   u32 BE                                  │    │
//! │  │  key:       key_len bytes                           │    │
//! │  │  value_len: i32 BE   (-1 = tombstone)               │    │
//! │  │  value:     value_len bytes (absent if tombstone)   │    │
//! │  │  timestamp: i64 BE   (milliseconds)                 │    │
//! │  │  ... repeated, strictly ascending by key ...        │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                      Index                          │    │
//! │  │  record start offsets: u64 BE each                  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                     Trailer                         │    │
//! │  │  index start offset: u64 BE                         │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Files are append-only and never rewritten; compaction writes a fresh
//! file. The file name encodes the generation so that an ascending
//! directory listing yields oldest-first order.

mod iterator;
mod reader;
mod writer;

pub use iterator::TableIter;
pub use reader::SsTable;
pub use writer::SsTableWriter;

/// File name prefix for every table in a data directory.
pub const FILE_PREFIX: &str = "SSTable_";

/// Extension of in-flight scratch files; never observed by readers.
pub const SCRATCH_EXTENSION: &str = "tmp";

/// `value_len` marker for tombstones.
pub(crate) const TOMBSTONE_LEN: i32 = -1;

/// File name for generation `n`: the prefix followed by the zero-padded
/// 64-bit binary rendering of the counter, so lexicographic order equals
/// numeric order.
pub fn generation_name(generation: usize) -> String {
    format!("{FILE_PREFIX}{generation:064b}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_names_sort_in_creation_order() {
        let names: Vec<String> = (0..70).map(generation_name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[0].len(), FILE_PREFIX.len() + 64);
        assert!(names[5].ends_with("101"));
    }
}
