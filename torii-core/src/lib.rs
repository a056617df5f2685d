//! # ToriiKV Core
//!
//! This crate provides the fundamental building blocks for ToriiKV:
//! - Record model (keys, values, tombstones, timestamps)
//! - Error types
//! - Configuration for the storage engine and the cluster layer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   torii-core                    │
//! ├─────────────────────────────────────────────────┤
//! │  • types      - Record, keys, timestamps        │
//! │  • error      - Error handling                  │
//! │  • config     - Store & cluster configuration   │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{ClusterConfig, StoreConfig};
pub use error::{Error, Result};
pub use types::{now_ms, successor_key, Record};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
