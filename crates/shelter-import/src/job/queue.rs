use std::sync::{Arc, Mutex};

use log::error;
use serde::Serialize;

use crate::error::WorkerError;

use super::error::JobError;
use super::executor::JobExecutor;

/// Hands accepted job ids to whatever runs them.
pub trait JobQueue: Send + Sync {
    fn submit(&self, job_id: &str) -> Result<(), WorkerError>;
}

/// A job the queue gave up on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    pub job_id: String,
    pub attempts: u32,
    pub error: String,
}

impl DeadLetter {
    pub fn new(job_id: &str, error: &JobError) -> Self {
        Self {
            job_id: job_id.to_string(),
            attempts: error.attempts().unwrap_or(0),
            error: error.to_string(),
        }
    }
}

/// Shared list of dead letters.
#[derive(Debug, Clone, Default)]
pub struct DeadLetters(Arc<Mutex<Vec<DeadLetter>>>);

impl DeadLetters {
    pub fn push(&self, letter: DeadLetter) {
        error!(
            "Dead-lettering job {} after {} attempt(s): {}",
            letter.job_id, letter.attempts, letter.error
        );
        if let Ok(mut letters) = self.0.lock() {
            letters.push(letter);
        }
    }

    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

/// Runs each job synchronously on the submitting thread.
pub struct InlineQueue {
    executor: Arc<JobExecutor>,
    dead_letters: DeadLetters,
}

impl InlineQueue {
    pub fn new(executor: Arc<JobExecutor>) -> Self {
        Self {
            executor,
            dead_letters: DeadLetters::default(),
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.snapshot()
    }
}

impl JobQueue for InlineQueue {
    /// The job outcome is recorded on the job itself; only the hand-off
    /// can fail here.
    fn submit(&self, job_id: &str) -> Result<(), WorkerError> {
        if let Err(e) = self.executor.execute(job_id) {
            self.dead_letters.push(DeadLetter::new(job_id, &e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_letter_from_exhausted_job() {
        let letter = DeadLetter::new(
            "j1",
            &JobError::RetriesExhausted {
                job_id: "j1".to_string(),
                attempts: 4,
                message: "disk full".to_string(),
            },
        );
        assert_eq!(letter.attempts, 4);
        assert_eq!(letter.error, "Job j1 failed after 4 attempts: disk full");

        let letters = DeadLetters::default();
        letters.push(letter.clone());
        letters.push(DeadLetter::new("j2", &JobError::NotFound("j2".to_string())));
        let all = letters.snapshot();
        assert_eq!(all[0], letter);
        assert_eq!(all[1].attempts, 0);
    }
}
