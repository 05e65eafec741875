use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use crate::config::Limits;
use crate::db::job_repo::{self, JobRow};
use crate::db::Database;
use crate::error::{StorageError, SubmissionError};
use crate::export::ExportRequest;
use crate::job::model::{
    InputSnapshot, StagedAttachment, JOB_TYPE_ANIMAL_EXPORT, JOB_TYPE_ANIMAL_IMPORT,
};
use crate::job::recovery::abandon_unqueued;
use crate::job::{JobQueue, JobStatus};
use crate::storage::{photo_key, proof_key, ObjectStore};

use super::validator::{validate, CheckedAttachment};
use super::Submission;

/// Returned synchronously once a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JobTicket {
    pub job_id: String,
    pub status: JobStatus,
}

/// Accepts submissions: validates, stages attachments, records a PENDING
/// job and hands its id to the queue.
///
/// A job whose hand-off fails is marked FAILED right away, so no accepted
/// job is left PENDING with nothing to run it.
pub struct IntakeService {
    db: Database,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn JobQueue>,
    limits: Limits,
}

impl IntakeService {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn JobQueue>,
        limits: Limits,
    ) -> Self {
        Self {
            db,
            store,
            queue,
            limits,
        }
    }

    pub fn submit(&self, submission: Submission) -> Result<JobTicket, SubmissionError> {
        let validated = validate(&submission, &self.limits)?;

        let mut staged_keys = Vec::new();
        let staged = self
            .stage_all(&validated.proofs, submission.shelter_id, proof_key, &mut staged_keys)
            .and_then(|proofs| {
                self.stage_all(&validated.photos, submission.shelter_id, photo_key, &mut staged_keys)
                    .map(|photos| (proofs, photos))
            });
        let (proofs, photos) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                self.discard(&staged_keys);
                return Err(e.into());
            }
        };

        let snapshot = InputSnapshot {
            shelter_id: submission.shelter_id,
            roster: validated.roster,
            medical: validated.medical,
            proofs,
            photos,
        };

        let job_id = uuid::Uuid::new_v4().to_string();
        let recorded = serde_json::to_string(&snapshot)
            .map_err(SubmissionError::from)
            .and_then(|input_snapshot| {
                self.record(&job_id, JOB_TYPE_ANIMAL_IMPORT, input_snapshot, submission.created_by)
            });
        if let Err(e) = recorded {
            self.discard(&staged_keys);
            return Err(e);
        }

        info!(
            "Accepted import job {} for shelter {} ({} proofs, {} photos)",
            job_id,
            submission.shelter_id,
            snapshot.proofs.len(),
            snapshot.photos.len()
        );

        self.enqueue(job_id, &staged_keys)
    }

    /// Accepts an export of a shelter's animals.
    pub fn submit_export(
        &self,
        request: ExportRequest,
        created_by: i64,
    ) -> Result<JobTicket, SubmissionError> {
        let request = request.normalized()?;
        let job_id = uuid::Uuid::new_v4().to_string();
        self.record(
            &job_id,
            JOB_TYPE_ANIMAL_EXPORT,
            serde_json::to_string(&request)?,
            created_by,
        )?;

        info!(
            "Accepted export job {} for shelter {}",
            job_id, request.shelter_id
        );

        self.enqueue(job_id, &[])
    }

    fn record(
        &self,
        job_id: &str,
        job_type: &str,
        input_snapshot: String,
        created_by: i64,
    ) -> Result<(), SubmissionError> {
        job_repo::insert(
            &self.db,
            &JobRow {
                id: job_id.to_string(),
                job_type: job_type.to_string(),
                status: job_repo::STATUS_PENDING.to_string(),
                input_snapshot,
                result_summary: None,
                created_by,
                attempts: 0,
                last_error: None,
                created_at: Utc::now().to_rfc3339(),
                started_at: None,
                completed_at: None,
            },
        )?;
        Ok(())
    }

    /// Hands the job to the queue. On failure the job is failed and its
    /// staged objects are removed, since nothing will ever read them.
    fn enqueue(&self, job_id: String, staged_keys: &[String]) -> Result<JobTicket, SubmissionError> {
        if let Err(source) = self.queue.submit(&job_id) {
            if let Err(e) = abandon_unqueued(&self.db, &job_id, 0, &source) {
                warn!("Could not mark unqueued job {} as failed: {}", job_id, e);
            }
            self.discard(staged_keys);
            return Err(SubmissionError::Enqueue { job_id, source });
        }

        Ok(JobTicket {
            job_id,
            status: JobStatus::Pending,
        })
    }

    fn stage_all(
        &self,
        items: &[CheckedAttachment<'_>],
        shelter_id: i64,
        make_key: fn(i64, &str) -> String,
        staged_keys: &mut Vec<String>,
    ) -> Result<Vec<StagedAttachment>, StorageError> {
        items
            .iter()
            .map(|item| -> Result<StagedAttachment, StorageError> {
                let key = make_key(shelter_id, &item.name.extension);
                self.store.put(&key, &item.file.bytes)?;
                staged_keys.push(key.clone());
                Ok(StagedAttachment {
                    filename: item.file.filename.clone(),
                    content_type: item.content_type.clone(),
                    size: item.file.size(),
                    url: self.store.public_url(&key),
                    storage_key: key,
                    animal_code: item.name.animal_code.clone(),
                    sequence: item.name.sequence,
                })
            })
            .collect()
    }

    /// Best-effort removal of blobs staged for a submission that was not
    /// accepted.
    fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.store.delete(key) {
                warn!("Failed to remove staged object {}: {}", key, e);
            }
        }
    }
}
