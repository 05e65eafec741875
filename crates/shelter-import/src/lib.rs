pub mod batch_status;
pub mod broadcast;
pub mod classify;
pub mod config;
pub mod correlation;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod intake;
pub mod job;
pub mod notify;
pub mod storage;
pub mod table;

pub use batch_status::{batch_update_status, BatchAction, BatchUpdateReport};
pub use broadcast::{ImportPhase, JobProgressBroadcaster, JobProgressEvent};
pub use classify::{classify, Category, ImportSummary};
pub use config::{load_config, load_config_from_str, ImportConfig, Limits, RetryConfig};
pub use correlation::{CodeMatch, CorrelationError, CorrelationIndex, MatchKind};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, Result, ShelterImportError, StorageError, SubmissionError, ValidationError,
    WorkerError,
};
pub use export::{ExportRequest, ExportSummary, Exporter};
pub use import::{ImportError, ImportStats, Importer, PhaseStats};
pub use intake::{IntakeService, JobTicket, Submission, UploadedFile};
pub use job::{
    requeue_unfinished, DeadLetter, InlineQueue, JobError, JobExecutor, JobQueue, JobStatus,
    JobView, RecoveryReport, RetryController, RetryPolicy, WorkerPool,
};
pub use notify::{LogNotifier, Notification, Notifier};
pub use storage::{FileObjectStore, MemoryObjectStore, ObjectStore};
