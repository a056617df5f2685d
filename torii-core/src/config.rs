//! # Configuration
//!
//! Configuration for the storage engine and the cluster layer.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the SSTable files. Created on open if missing.
    pub data_dir: PathBuf,
    /// Memtable size threshold that triggers a flush.
    pub memtable_limit: usize,
}

impl StoreConfig {
    pub const DEFAULT_MEMTABLE_LIMIT: usize = 32 * 1024 * 1024; // 32MiB

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            memtable_limit: Self::DEFAULT_MEMTABLE_LIMIT,
        }
    }
}

/// Cluster layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// All node endpoints, self included (e.g. `http://10.0.0.1:8000`).
    /// Sorted lexicographically at startup; a node's index in the sorted
    /// list is its stable node id. Immutable for the process lifetime.
    pub topology: Vec<String>,
    /// Concurrent entity requests handled per node.
    pub entity_workers: usize,
    /// Client shards per remote replica.
    pub pool_shards: usize,
    /// Timeout applied to every proxied subrequest.
    pub proxy_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            topology: Vec::new(),
            entity_workers: 8,
            pool_shards: 8,
            proxy_timeout: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.memtable_limit, 32 * 1024 * 1024);
    }

    #[test]
    fn test_cluster_config_defaults() {
        let config = ClusterConfig::default();
        assert_eq!(config.entity_workers, 8);
        assert_eq!(config.proxy_timeout, Duration::from_millis(100));
    }
}
