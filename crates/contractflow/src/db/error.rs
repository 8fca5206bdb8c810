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

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// A compare-and-swap update found a different stored version
    /// (or no row at all).
    #[error("Version conflict on {table} '{id}': expected version {expected}")]
    VersionConflict {
        table: &'static str,
        id: String,
        expected: i64,
    },

    /// An insert collided with a row a concurrent writer already created
    /// for the same `table` record.
    #[error("{table} '{id}' was already claimed by another write")]
    AlreadyClaimed { table: &'static str, id: String },

    /// A JSON column could not be encoded or decoded.
    #[error("Invalid JSON in {table}.{column}: {source}")]
    Json {
        table: &'static str,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
