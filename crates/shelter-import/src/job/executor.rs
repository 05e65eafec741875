//! Runs one job end to end: claim, run with retries, classify, record.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::broadcast::job_progress::ImportPhase;
use crate::broadcast::JobProgressBroadcaster;
use crate::classify::{classify, ImportSummary};
use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::export::{ExportRequest, ExportSummary, Exporter};
use crate::import::{
    BroadcastProgress, ImportError, ImportStats, Importer, NoopProgress, ProgressEvent,
    ProgressReporter,
};

use super::error::JobError;
use super::model::{FailureSummary, Job, JobStatus, JOB_TYPE_ANIMAL_EXPORT, JOB_TYPE_ANIMAL_IMPORT};
use super::retry::RetryController;

/// What happened to a delivered job.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(ImportSummary),
    Exported(ExportSummary),
    /// The job had already reached this terminal status.
    Skipped(JobStatus),
    /// Another delivery of the job claimed it while this one ran; nothing
    /// was recorded by this delivery.
    Superseded,
}

/// Output of one successful attempt, per job type.
enum Work {
    Imported(ImportStats),
    Exported(ExportSummary),
}

pub struct JobExecutor {
    db: Database,
    importer: Importer,
    exporter: Exporter,
    retry: RetryController,
    broadcaster: Option<JobProgressBroadcaster>,
}

impl JobExecutor {
    /// Exports are written to the importer's object store.
    pub fn new(db: Database, importer: Importer, retry: RetryController) -> Self {
        let exporter = Exporter::new(db.clone(), Arc::clone(importer.store()));
        Self {
            db,
            importer,
            exporter,
            retry,
            broadcaster: None,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Executes a delivered job id.
    ///
    /// Duplicate deliveries of finished jobs are acknowledged without
    /// running anything. Failed attempts keep the job RUNNING with its
    /// attempt count and last error updated; the job only becomes FAILED
    /// once retries are exhausted or the error cannot be retried.
    ///
    /// Each attempt claims the job against the attempt count this delivery
    /// last saw. When a concurrent delivery of the same job claims a later
    /// attempt, this one stops and leaves the job to it.
    pub fn execute(&self, job_id: &str) -> Result<ExecutionOutcome, JobError> {
        let row = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if row.is_terminal() {
            let status = row
                .status
                .parse::<JobStatus>()
                .map_err(|reason| DatabaseError::Corrupt {
                    column: "status",
                    reason,
                })?;
            info!(
                "Job {} already {}, acknowledging duplicate delivery",
                job_id, status
            );
            return Ok(ExecutionOutcome::Skipped(status));
        }

        let progress: Box<dyn ProgressReporter> = match &self.broadcaster {
            Some(broadcaster) => Box::new(BroadcastProgress::new(job_id, broadcaster.sender())),
            None => Box::new(NoopProgress),
        };

        let mut claimed = row.attempts;
        let result = self.retry.run(|attempt| {
            progress.report(ProgressEvent::Attempt { attempt });
            claimed = job_repo::begin_attempt(&self.db, job_id, &Utc::now().to_rfc3339(), claimed)?;
            let claim = claimed;

            self.attempt(&row, progress.as_ref())
                .inspect_err(|e| self.note_attempt_error(job_id, claim, e, progress.as_ref()))
        });

        let completed_at = Utc::now().to_rfc3339();
        match result {
            Ok(Work::Imported(stats)) => {
                progress.report(ProgressEvent::Phase {
                    phase: ImportPhase::Classifying,
                    message: "Classifying result".to_string(),
                });
                let summary = classify(&stats, self.importer.limits().max_error_samples);
                let recorded = self.finish(
                    job_id,
                    summary.job_status(),
                    &serde_json::to_string(&summary)?,
                    &completed_at,
                    claimed,
                )?;
                if !recorded {
                    return Ok(ExecutionOutcome::Superseded);
                }
                info!(
                    "Job {} finished: {} ({})",
                    job_id, summary.category, summary.message
                );
                progress.report(ProgressEvent::Completed {
                    category: summary.category.as_str().to_string(),
                    message: summary.message.clone(),
                });
                Ok(ExecutionOutcome::Completed(summary))
            }
            Ok(Work::Exported(summary)) => {
                let recorded = self.finish(
                    job_id,
                    JobStatus::Succeeded,
                    &serde_json::to_string(&summary)?,
                    &completed_at,
                    claimed,
                )?;
                if !recorded {
                    return Ok(ExecutionOutcome::Superseded);
                }
                info!("Job {} finished: {}", job_id, summary.message);
                progress.report(ProgressEvent::Completed {
                    category: summary.category.clone(),
                    message: summary.message.clone(),
                });
                Ok(ExecutionOutcome::Exported(summary))
            }
            Err(failure) => {
                if let ImportError::Database(DatabaseError::ClaimLost { .. }) = failure.error {
                    info!("Job {} taken over by another delivery: {}", job_id, failure.error);
                    return Ok(ExecutionOutcome::Superseded);
                }

                let message = failure.error.to_string();
                let summary =
                    FailureSummary::new(message.clone(), failure.error.kind(), failure.attempts);
                let recorded = self.finish(
                    job_id,
                    JobStatus::Failed,
                    &serde_json::to_string(&summary)?,
                    &completed_at,
                    claimed,
                )?;
                if !recorded {
                    return Ok(ExecutionOutcome::Superseded);
                }
                warn!(
                    "Job {} failed after {} attempt(s): {}",
                    job_id, failure.attempts, message
                );
                progress.report(ProgressEvent::Failed {
                    error: message.clone(),
                });

                let job_id = job_id.to_string();
                Err(if failure.exhausted {
                    JobError::RetriesExhausted {
                        job_id,
                        attempts: failure.attempts,
                        message,
                    }
                } else {
                    JobError::Rejected {
                        job_id,
                        attempts: failure.attempts,
                        message,
                    }
                })
            }
        }
    }

    /// One attempt of the job's work, chosen by its type tag.
    fn attempt(&self, row: &JobRow, progress: &dyn ProgressReporter) -> Result<Work, ImportError> {
        match row.job_type.as_str() {
            JOB_TYPE_ANIMAL_IMPORT => {
                let job = Job::from_row(row)?;
                self.importer.run(&job, progress).map(Work::Imported)
            }
            JOB_TYPE_ANIMAL_EXPORT => {
                let request = ExportRequest::from_row(row)?;
                self.exporter
                    .run(&row.id, &request, &row.created_at, progress)
                    .map(Work::Exported)
            }
            other => Err(ImportError::InvalidInput(format!(
                "unknown job type '{}'",
                other
            ))),
        }
    }

    /// Records the terminal status. Returns `false` when another delivery
    /// holds the job.
    fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        summary: &str,
        completed_at: &str,
        claimed: u32,
    ) -> Result<bool, JobError> {
        match job_repo::complete(&self.db, job_id, status.as_str(), summary, completed_at, claimed) {
            Ok(()) => Ok(true),
            Err(e @ DatabaseError::ClaimLost { .. }) => {
                info!("Job {} taken over by another delivery: {}", job_id, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn note_attempt_error(
        &self,
        job_id: &str,
        claimed: u32,
        error: &ImportError,
        progress: &dyn ProgressReporter,
    ) {
        if let Err(e) =
            job_repo::record_attempt_error(&self.db, job_id, &error.to_string(), claimed)
        {
            warn!("Could not record attempt error for job {}: {}", job_id, e);
        }
        if error.is_retryable() {
            progress.report(ProgressEvent::Phase {
                phase: ImportPhase::Retrying,
                message: error.to_string(),
            });
        }
    }
}
