//! Error types for agentlog-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the agentlog-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error tied to a specific file
    #[error("IO error on {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content hashing failed
    #[error("cannot hash {}: {message}", path.display())]
    Hash { path: PathBuf, message: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session not found (no stored row, or no source file on disk)
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::File {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for agentlog-core
pub type Result<T> = std::result::Result<T, Error>;
