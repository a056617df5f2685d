//! # Error Handling
//!
//! Error types shared across the ToriiKV crates.

use thiserror::Error;

/// Result type alias for ToriiKV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for ToriiKV
#[derive(Error, Debug)]
pub enum Error {
    #[error("SSTable error: {message}")]
    Table { message: String },

    #[error("engine error: {message}")]
    Engine { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("cluster error: {message}")]
    Cluster { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Shorthand for a corrupt or otherwise unreadable SSTable.
    pub fn table(message: impl Into<String>) -> Self {
        Error::Table {
            message: message.into(),
        }
    }

    /// Shorthand for an engine-level failure.
    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine {
            message: message.into(),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}
