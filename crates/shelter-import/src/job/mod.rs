//! Job records, queueing, retries and execution.

pub mod error;
pub mod executor;
pub mod model;
pub mod pool;
pub mod queue;
pub mod recovery;
pub mod retry;

pub use error::JobError;
pub use executor::{ExecutionOutcome, JobExecutor};
pub use model::{
    FailureSummary, InputSnapshot, Job, JobStatus, JobView, ResultSummary, StagedAttachment,
    TableInput, JOB_TYPE_ANIMAL_EXPORT, JOB_TYPE_ANIMAL_IMPORT,
};
pub use pool::{JobOutcome, WorkerPool};
pub use queue::{DeadLetter, DeadLetters, InlineQueue, JobQueue};
pub use recovery::{abandon_unqueued, requeue_unfinished, RecoveryReport};
pub use retry::{Backoff, RecordingBackoff, RetryController, RetryFailure, RetryPolicy, ThreadSleep};
