//! Error types for the CIL index.
//!
//! This module provides a single structured error type across parsing,
//! normalization, store access, and configuration, replacing ad-hoc
//! `Box<dyn Error>` plumbing with one enum the CLI boundary can match on.

use thiserror::Error;

/// The main error type for CIL indexing and query operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Malformed CIL syntax. Fatal for the offending file.
    #[error("parse error in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: cil_parser::ParseError,
    },

    /// An unknown statement head, or a whitelisted head with the wrong
    /// shape. Fatal for the offending file.
    #[error("normalization error: {0}")]
    Normalizer(#[from] cil_data::NormalizerError),

    /// The persistent store failed to acquire its lock within the
    /// configured busy timeout.
    #[error("store busy: could not acquire lock within the configured timeout")]
    StoreBusy,

    /// The persistent store failed for reasons other than lock contention.
    #[error("store I/O error: {0}")]
    StoreIo(rusqlite::Error),

    /// A requested file no longer exists on disk. Not fatal: refresh
    /// silently skips it, but some callers surface it as a hard error.
    #[error("file not found: {0}")]
    MissingFile(String),

    /// Malformed configuration, or a combination of CLI flags the
    /// specification declares mutually exclusive.
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O failures outside the store (e.g. reading a CIL source file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A type alias for Results that use [`IndexError`].
pub type Result<T> = std::result::Result<T, IndexError>;

impl From<config::ConfigError> for IndexError {
    fn from(err: config::ConfigError) -> Self {
        IndexError::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::DatabaseBusy => {
                IndexError::StoreBusy
            }
            _ => IndexError::StoreIo(err),
        }
    }
}
