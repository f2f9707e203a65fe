//! Error types and Result alias used across the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using symdex's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for symdex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage/schema error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Per-file parse failure. Non-fatal, the file is skipped.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    /// An indexing run was requested while one is active.
    #[error("an indexing run is already in progress")]
    RunInProgress,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors. Fatal at open time, caught and logged per file
/// during a run.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Could not open or create the index database.
    #[error("failed to open index at {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// Underlying SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl Error {
    /// Create a parse error for a file.
    pub fn parse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}

impl From<r2d2::Error> for Error {
    fn from(err: r2d2::Error) -> Self {
        Self::Storage(StorageError::Pool(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::parse("src/a.py", "bad syntax");
        assert_eq!(err.to_string(), "failed to parse src/a.py: bad syntax");

        let err = Error::RunInProgress;
        assert!(err.to_string().contains("already in progress"));
    }

    #[test]
    fn test_sqlite_error_wraps_into_storage() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }
}
