//! Job progress broadcaster for real-time import status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Stage an import job is in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Queued,
    Roster,
    MedicalHistory,
    Proofs,
    Photos,
    Exporting,
    Classifying,
    Retrying,
    Completed,
    Failed,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportPhase::Queued => write!(f, "Queued"),
            ImportPhase::Roster => write!(f, "Importing animals"),
            ImportPhase::MedicalHistory => write!(f, "Importing medical history"),
            ImportPhase::Proofs => write!(f, "Attaching medical proofs"),
            ImportPhase::Photos => write!(f, "Attaching photos"),
            ImportPhase::Exporting => write!(f, "Exporting animals"),
            ImportPhase::Classifying => write!(f, "Classifying result"),
            ImportPhase::Retrying => write!(f, "Waiting to retry"),
            ImportPhase::Completed => write!(f, "Completed"),
            ImportPhase::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Processing,
    Completed,
    Failed,
}

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub phase: ImportPhase,
    pub status: ProgressStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Attempt number, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Outcome category (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, phase: ImportPhase, message: &str) -> Self {
        let status = match phase {
            ImportPhase::Completed => ProgressStatus::Completed,
            ImportPhase::Failed => ProgressStatus::Failed,
            _ => ProgressStatus::Processing,
        };

        Self {
            job_id: job_id.to_string(),
            phase,
            status,
            message: message.to_string(),
            timestamp: Utc::now(),
            attempt: None,
            category: None,
            error: None,
        }
    }

    pub fn completed(job_id: &str, category: &str, message: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            ..Self::new(job_id, ImportPhase::Completed, message)
        }
    }

    pub fn failed(job_id: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(job_id, ImportPhase::Failed, "Import failed")
        }
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn sender(&self) -> Arc<broadcast::Sender<JobProgressEvent>> {
        Arc::clone(&self.sender)
    }

    /// Creates a tracker for one job and announces it as queued.
    pub fn start_job(&self, job_id: &str) -> JobProgressTracker {
        let tracker = JobProgressTracker::new(job_id, Arc::clone(&self.sender));
        tracker.update_phase(ImportPhase::Queued, "Job queued for import");
        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single job.
pub struct JobProgressTracker {
    job_id: String,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn new(job_id: &str, sender: Arc<broadcast::Sender<JobProgressEvent>>) -> Self {
        Self {
            job_id: job_id.to_string(),
            sender,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn update_phase(&self, phase: ImportPhase, message: &str) {
        let _ = self
            .sender
            .send(JobProgressEvent::new(&self.job_id, phase, message));
    }

    pub fn attempt(&self, attempt: u32, phase: ImportPhase, message: &str) {
        let mut event = JobProgressEvent::new(&self.job_id, phase, message);
        event.attempt = Some(attempt);
        let _ = self.sender.send(event);
    }

    pub fn completed(&self, category: &str, message: &str) {
        let _ = self
            .sender
            .send(JobProgressEvent::completed(&self.job_id, category, message));
    }

    pub fn failed(&self, error: &str) {
        let _ = self.sender.send(JobProgressEvent::failed(&self.job_id, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(JobProgressEvent::new("job-1", ImportPhase::Roster, "Importing"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.phase, ImportPhase::Roster);
        assert_eq!(received.status, ProgressStatus::Processing);
    }

    #[test]
    fn test_start_job_sends_queued() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let tracker = broadcaster.start_job("job-2");
        assert_eq!(rx.try_recv().unwrap().phase, ImportPhase::Queued);

        tracker.attempt(2, ImportPhase::Photos, "Attaching photos");
        let received = rx.try_recv().unwrap();
        assert_eq!(received.attempt, Some(2));
        assert_eq!(received.phase, ImportPhase::Photos);
    }

    #[test]
    fn test_completion_and_failure_events() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let tracker = JobProgressTracker::new("job-3", broadcaster.sender());

        tracker.completed("partial_success", "Partial success: photos 3/5 imported");
        let done = rx.try_recv().unwrap();
        assert_eq!(done.status, ProgressStatus::Completed);
        assert_eq!(done.category.as_deref(), Some("partial_success"));

        tracker.failed("database is locked");
        let failed = rx.try_recv().unwrap();
        assert_eq!(failed.status, ProgressStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("database is locked"));
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = JobProgressEvent::completed("job-4", "success", "ok");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["jobId"], "job-4");
        assert_eq!(json["phase"], "completed");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_send_without_receivers_is_ok() {
        let broadcaster = JobProgressBroadcaster::default();
        broadcaster.send(JobProgressEvent::failed("job-5", "boom"));
    }
}
