//! # Record Model
//!
//! A record is the unit of storage and replication: a key, an optional
//! value and a millisecond timestamp. A record without a value is a
//! tombstone; its timestamp still participates in last-writer-wins
//! ordering so that a deletion can shadow older values on trailing
//! replicas.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

/// A single key-value record with a write timestamp.
///
/// Records are ordered by key (lexicographic on raw bytes); the timestamp
/// orders writes to the *same* key across replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: Bytes,
    value: Option<Bytes>,
    timestamp: i64,
}

impl Record {
    /// Create a live record.
    pub fn new(key: Bytes, value: Bytes, timestamp: i64) -> Self {
        Self {
            key,
            value: Some(value),
            timestamp,
        }
    }

    /// Create a tombstone for `key`.
    pub fn tombstone(key: Bytes, timestamp: i64) -> Self {
        Self {
            key,
            value: None,
            timestamp,
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Size charged against the memtable threshold: key plus value bytes,
    /// where a tombstone's value counts as zero.
    pub fn accounted_size(&self) -> usize {
        self.key.len() + self.value.as_ref().map_or(0, Bytes::len)
    }
}

/// The shortest key strictly greater than `key` (`key ‖ 0x00`).
///
/// Used as the exclusive upper bound when a range scan should cover
/// exactly one key.
pub fn successor_key(key: &[u8]) -> Bytes {
    let mut next = BytesMut::with_capacity(key.len() + 1);
    next.put_slice(key);
    next.put_u8(0);
    next.freeze()
}

/// Millisecond wall-clock timestamp.
///
/// Monotonicity is not required; large backward jumps degrade
/// last-writer-wins but do not break the engine.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tombstone_has_no_value() {
        let record = Record::tombstone(Bytes::from_static(b"k"), 7);
        assert!(record.is_tombstone());
        assert_eq!(record.value(), None);
        assert_eq!(record.timestamp(), 7);
    }

    #[test]
    fn test_accounted_size() {
        let live = Record::new(Bytes::from_static(b"key"), Bytes::from_static(b"value"), 0);
        assert_eq!(live.accounted_size(), 8);

        let dead = Record::tombstone(Bytes::from_static(b"key"), 0);
        assert_eq!(dead.accounted_size(), 3);
    }

    #[test]
    fn test_successor_key_orders_directly_after() {
        let key = b"abc";
        let next = successor_key(key);
        assert_eq!(&next[..], b"abc\x00");
        assert!(&next[..] > &key[..]);
        assert!(&b"abd"[..] > &next[..]);
        assert!(&b"abca"[..] > &next[..]);
    }
}
