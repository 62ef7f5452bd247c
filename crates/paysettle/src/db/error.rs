//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The record itself was refused (constraint, duplicate, bad value).
    #[error("Record rejected: {0}")]
    Rejected(String),

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    /// True when the failure is specific to the record being written and
    /// other writes can still be expected to succeed.
    ///
    /// Everything else (lock poisoning, busy/locked files, I/O, corrupt
    /// schema) is treated as a storage outage.
    pub fn is_row_level(&self) -> bool {
        match self {
            DatabaseError::Rejected(_) => true,
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::ConstraintViolation | rusqlite::ErrorCode::TooBig
            ),
            DatabaseError::Sqlite(rusqlite::Error::ToSqlConversionFailure(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_level_classification() {
        assert!(DatabaseError::Rejected("dup".into()).is_row_level());
        assert!(!DatabaseError::LockPoisoned.is_row_level());

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("NOT NULL constraint failed".into()),
        );
        assert!(DatabaseError::Sqlite(constraint).is_row_level());

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(!DatabaseError::Sqlite(busy).is_row_level());
    }
}
