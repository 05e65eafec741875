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

    /// A conditional status update matched no row.
    #[error("Job {id} cannot move from '{from}' to '{to}'")]
    InvalidTransition { id: String, from: String, to: String },

    /// Another delivery of the job claimed a later attempt.
    #[error("Job {id} was claimed by another delivery (attempt {current}, expected {claimed})")]
    ClaimLost { id: String, claimed: u32, current: u32 },

    /// A stored value could not be decoded.
    #[error("Corrupt value in column '{column}': {reason}")]
    Corrupt { column: &'static str, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
