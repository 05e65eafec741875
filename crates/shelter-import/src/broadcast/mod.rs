pub mod job_progress;

pub use job_progress::{
    ImportPhase, JobProgressBroadcaster, JobProgressEvent, JobProgressTracker, ProgressStatus,
};
