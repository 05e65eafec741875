use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to encode result summary: {0}")]
    Summary(#[from] serde_json::Error),

    #[error("Job {job_id} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        job_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Job {job_id} failed: {message}")]
    Rejected {
        job_id: String,
        attempts: u32,
        message: String,
    },
}

impl JobError {
    /// Attempts made before giving up, when the job actually ran.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            JobError::RetriesExhausted { attempts, .. } | JobError::Rejected { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}
