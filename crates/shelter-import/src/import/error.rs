use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::db::DatabaseError;
use crate::error::StorageError;
use crate::storage::ObjectStore;

/// Errors that abort an attempt of an import or export job.
///
/// Row and item failures are never represented here; they are counted in
/// [`super::PhaseStats`].
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Object storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("Too many errors ({failed}), aborting import")]
    CircuitBreaker { failed: u32 },

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl ImportError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ImportError::Database(DatabaseError::InvalidTransition { .. })
            | ImportError::Database(DatabaseError::ClaimLost { .. })
            | ImportError::Database(DatabaseError::Corrupt { .. }) => false,
            ImportError::Database(_) | ImportError::Storage(_) => true,
            ImportError::InvalidInput(_)
            | ImportError::CircuitBreaker { .. }
            | ImportError::Csv(_) => false,
        }
    }

    /// Short error type recorded in failure summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Database(_) => "DatabaseError",
            ImportError::Storage(_) => "StorageError",
            ImportError::InvalidInput(_) => "InvalidInput",
            ImportError::CircuitBreaker { .. } => "CircuitBreaker",
            ImportError::Csv(_) => "CsvError",
        }
    }
}

/// Failure of a single proof or photo. Recorded as an error sample, never
/// propagated out of its phase.
#[derive(Error, Debug)]
pub(crate) enum ItemError {
    #[error("{0}")]
    Correlation(#[from] CorrelationError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Database(#[from] DatabaseError),

    #[error("stored object {key} is {actual} bytes, expected {expected}")]
    Truncated {
        key: String,
        expected: u64,
        actual: u64,
    },
}

impl ItemError {
    /// Confirms a staged object is present with the size recorded at
    /// submission.
    pub(crate) fn check_staged(
        store: &dyn ObjectStore,
        key: &str,
        expected: u64,
    ) -> Result<(), ItemError> {
        let meta = store.head(key)?;
        if meta.size != expected {
            return Err(ItemError::Truncated {
                key: key.to_string(),
                expected,
                actual: meta.size,
            });
        }
        Ok(())
    }
}
