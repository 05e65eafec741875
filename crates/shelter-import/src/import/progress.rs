use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::job_progress::{ImportPhase, JobProgressEvent, JobProgressTracker};

/// Events emitted by the importer and executor while a job runs.
pub enum ProgressEvent {
    Phase { phase: ImportPhase, message: String },
    Attempt { attempt: u32 },
    Completed { category: String, message: String },
    Failed { error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges importer events to the broadcast channel.
pub struct BroadcastProgress {
    tracker: JobProgressTracker,
    attempt: std::sync::atomic::AtomicU32,
}

impl BroadcastProgress {
    pub fn new(job_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            tracker: JobProgressTracker::new(job_id, sender),
            attempt: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        use std::sync::atomic::Ordering;

        match event {
            ProgressEvent::Phase { phase, message } => {
                match self.attempt.load(Ordering::Relaxed) {
                    0 => self.tracker.update_phase(phase, &message),
                    n => self.tracker.attempt(n, phase, &message),
                }
            }
            ProgressEvent::Attempt { attempt } => {
                self.attempt.store(attempt, Ordering::Relaxed);
            }
            ProgressEvent::Completed { category, message } => {
                self.tracker.completed(&category, &message);
            }
            ProgressEvent::Failed { error } => {
                self.tracker.failed(&error);
            }
        }
    }
}
