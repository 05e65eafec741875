//! Isolated import environment for integration tests.
//!
//! Each `TestHarness` owns a fresh SQLite file in a temp directory, an
//! in-memory object store and a backoff that records delays instead of
//! sleeping. Accepted jobs are parked in a [`PendingQueue`] so a test can
//! tamper with storage before the import runs.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use shelter_import::db::animal_repo::{self, AnimalRow};
use shelter_import::db::job_repo::{self, JobFilter, JobRow};
use shelter_import::error::WorkerError;
use shelter_import::export::ExportRequest;
use shelter_import::job::{
    ExecutionOutcome, InputSnapshot, Job, RecordingBackoff, ResultSummary,
};
use shelter_import::{
    Database, ImportSummary, Importer, IntakeService, JobError, JobExecutor, JobQueue, JobTicket,
    JobView, Limits, MemoryObjectStore, RetryController, RetryPolicy, Submission, SubmissionError,
};

pub const SHELTER_ID: i64 = 7;
pub const USER_ID: i64 = 42;

/// Queue whose workers are gone.
pub struct ClosedQueue;

impl JobQueue for ClosedQueue {
    fn submit(&self, _job_id: &str) -> Result<(), WorkerError> {
        Err(WorkerError::ChannelClosed)
    }
}

/// Queue that only remembers delivered ids.
#[derive(Default)]
pub struct PendingQueue {
    ids: Mutex<Vec<String>>,
}

impl PendingQueue {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.ids.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }
}

impl JobQueue for PendingQueue {
    fn submit(&self, job_id: &str) -> Result<(), WorkerError> {
        self.ids.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub store: Arc<MemoryObjectStore>,
    pub backoff: Arc<RecordingBackoff>,
    pub executor: Arc<JobExecutor>,
    pub queue: Arc<PendingQueue>,
    pub intake: IntakeService,
}

impl TestHarness {
    /// Default limits, three attempts and a 5 ms base delay.
    pub fn new() -> Self {
        Self::with_options(Limits::default(), default_policy(), |_| RecordingBackoff::new())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self::with_options(limits, default_policy(), |_| RecordingBackoff::new())
    }

    /// `make_backoff` receives the database so wait hooks can repair (or
    /// break) it between attempts.
    pub fn with_options<F>(limits: Limits, policy: RetryPolicy, make_backoff: F) -> Self
    where
        F: FnOnce(Database) -> RecordingBackoff,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("import.db")).expect("Failed to open database");
        let store = Arc::new(MemoryObjectStore::new());
        let backoff = Arc::new(make_backoff(db.clone()));

        let importer = Importer::new(db.clone(), store.clone(), limits.clone());
        let retry = RetryController::new(policy, backoff.clone());
        let executor = Arc::new(JobExecutor::new(db.clone(), importer, retry));

        let queue = Arc::new(PendingQueue::default());
        let intake = IntakeService::new(db.clone(), store.clone(), queue.clone(), limits);

        Self {
            temp_dir,
            db,
            store,
            backoff,
            executor,
            queue,
            intake,
        }
    }

    pub fn submit(&self, submission: Submission) -> Result<JobTicket, SubmissionError> {
        self.intake.submit(submission)
    }

    pub fn submit_export(&self, request: ExportRequest) -> Result<JobTicket, SubmissionError> {
        self.intake.submit_export(request, USER_ID)
    }

    /// Submits and panics on rejection.
    pub fn accept(&self, submission: Submission) -> String {
        self.submit(submission).expect("submission rejected").job_id
    }

    /// Executes every parked job in delivery order.
    pub fn run_pending(&self) -> Vec<Result<ExecutionOutcome, JobError>> {
        self.queue
            .take()
            .iter()
            .map(|id| self.executor.execute(id))
            .collect()
    }

    /// Executes every parked job and returns the single summary.
    pub fn run_one(&self) -> ImportSummary {
        let mut results = self.run_pending();
        assert_eq!(results.len(), 1, "expected exactly one parked job");
        match results.remove(0) {
            Ok(ExecutionOutcome::Completed(summary)) => summary,
            other => panic!("job did not complete: {:?}", other),
        }
    }

    pub fn job(&self, job_id: &str) -> JobRow {
        job_repo::find_by_id(&self.db, job_id)
            .unwrap()
            .expect("job not found")
    }

    pub fn view(&self, job_id: &str) -> JobView {
        JobView::from_row(&self.job(job_id)).unwrap()
    }

    pub fn snapshot(&self, job_id: &str) -> InputSnapshot {
        Job::from_row(&self.job(job_id)).unwrap().snapshot
    }

    pub fn result_summary(&self, job_id: &str) -> ResultSummary {
        self.view(job_id)
            .result_summary
            .expect("job has no result summary")
    }

    pub fn animals(&self, job_id: &str) -> Vec<AnimalRow> {
        self.db
            .with_conn(|c| animal_repo::list_by_job(c, job_id))
            .unwrap()
    }

    pub fn job_count(&self) -> u64 {
        job_repo::query(&self.db, &JobFilter::default()).unwrap().1
    }

    /// Runs raw SQL against the harness database.
    pub fn sql(&self, statements: &str) {
        self.db
            .with_conn(|c| {
                c.execute_batch(statements)?;
                Ok(())
            })
            .unwrap();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5))
}

/// A roster-only submission for the harness shelter.
pub fn submission(roster: shelter_import::UploadedFile) -> Submission {
    Submission::new(SHELTER_ID, USER_ID, roster)
}
