//! Startup sweep for jobs that never reached a terminal status.
//!
//! A job stays PENDING when its hand-off to the queue failed, and RUNNING
//! when the process stopped mid-run. Both are delivered again; a job whose
//! delivery fails is failed with an enqueue summary instead of being left
//! behind.

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use crate::db::job_repo;
use crate::db::{Database, DatabaseError};
use crate::error::WorkerError;

use super::error::JobError;
use super::model::FailureSummary;
use super::queue::JobQueue;

/// Error type recorded for jobs that could not be handed to a worker.
pub const ENQUEUE_ERROR: &str = "EnqueueError";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub requeued: Vec<String>,
    pub abandoned: Vec<String>,
}

/// Delivers every PENDING or RUNNING job to `queue` again, oldest first.
pub fn requeue_unfinished(db: &Database, queue: &dyn JobQueue) -> Result<RecoveryReport, JobError> {
    let mut report = RecoveryReport::default();

    for row in job_repo::list_unfinished(db)? {
        match queue.submit(&row.id) {
            Ok(()) => {
                info!(
                    "Requeued {} job {} ({} attempt(s) so far)",
                    row.status, row.id, row.attempts
                );
                report.requeued.push(row.id);
            }
            Err(e) => {
                abandon_unqueued(db, &row.id, row.attempts, &e)?;
                report.abandoned.push(row.id);
            }
        }
    }

    Ok(report)
}

/// Fails a job whose hand-off to the queue failed.
pub fn abandon_unqueued(
    db: &Database,
    job_id: &str,
    attempts: u32,
    error: &WorkerError,
) -> Result<(), DatabaseError> {
    let summary = FailureSummary::new(
        format!("Job could not be queued: {}", error),
        ENQUEUE_ERROR,
        attempts,
    );
    let summary = serde_json::to_string(&summary).map_err(|e| DatabaseError::Corrupt {
        column: "result_summary",
        reason: e.to_string(),
    })?;
    job_repo::abandon(db, job_id, &summary, &Utc::now().to_rfc3339())?;
    warn!("Job {} could not be queued and was marked failed: {}", job_id, error);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db::job_repo::JobRow;
    use crate::job::model::{JobView, ResultSummary, JOB_TYPE_ANIMAL_IMPORT};

    #[derive(Default)]
    struct FlakyQueue {
        accepted: Mutex<Vec<String>>,
        refuse: Vec<&'static str>,
    }

    impl JobQueue for FlakyQueue {
        fn submit(&self, job_id: &str) -> Result<(), WorkerError> {
            if self.refuse.iter().any(|id| *id == job_id) {
                return Err(WorkerError::ChannelClosed);
            }
            self.accepted.lock().unwrap().push(job_id.to_string());
            Ok(())
        }
    }

    fn insert(db: &Database, id: &str, created_at: &str) {
        job_repo::insert(
            db,
            &JobRow {
                id: id.to_string(),
                job_type: JOB_TYPE_ANIMAL_IMPORT.to_string(),
                status: job_repo::STATUS_PENDING.to_string(),
                input_snapshot: r#"{"shelter_id":1,"roster":{"filename":"a.csv","size":0,"content":""}}"#.to_string(),
                result_summary: None,
                created_by: 1,
                attempts: 0,
                last_error: None,
                created_at: created_at.to_string(),
                started_at: None,
                completed_at: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_requeue_unfinished() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, "pending", "2026-01-02T00:00:00Z");
        insert(&db, "running", "2026-01-01T00:00:00Z");
        insert(&db, "refused", "2026-01-03T00:00:00Z");
        insert(&db, "done", "2026-01-01T00:00:00Z");
        job_repo::begin_attempt(&db, "running", "2026-01-01T00:00:01Z", 0).unwrap();
        job_repo::begin_attempt(&db, "done", "2026-01-01T00:00:01Z", 0).unwrap();
        job_repo::complete(&db, "done", "SUCCEEDED", "{}", "2026-01-01T00:00:02Z", 1).unwrap();

        let queue = FlakyQueue {
            refuse: vec!["refused"],
            ..Default::default()
        };
        let report = requeue_unfinished(&db, &queue).unwrap();

        assert_eq!(report.requeued, vec!["running", "pending"]);
        assert_eq!(report.abandoned, vec!["refused"]);
        assert_eq!(*queue.accepted.lock().unwrap(), vec!["running", "pending"]);

        let refused = job_repo::find_by_id(&db, "refused").unwrap().unwrap();
        assert_eq!(refused.status, "FAILED");
        let view = JobView::from_row(&refused).unwrap();
        let Some(ResultSummary::Crashed(summary)) = view.result_summary else {
            panic!("expected a failure summary");
        };
        assert_eq!(summary.error_type, ENQUEUE_ERROR);
        assert_eq!(summary.attempts, 0);
        assert!(summary.message.contains("could not be queued"));

        // Delivered jobs stay unfinished until a worker runs them.
        let queue = FlakyQueue::default();
        let report = requeue_unfinished(&db, &queue).unwrap();
        assert_eq!(report.requeued, vec!["running", "pending"]);
        assert!(report.abandoned.is_empty());
    }
}
