//! The four-phase import pipeline: roster, medical history, proofs, photos.

mod dates;
pub mod error;
mod medical;
mod photos;
pub mod progress;
mod proofs;
mod roster;
pub mod runner;
pub mod stats;

pub use dates::{normalize_date, parse_date, DATE_FORMATS};
pub use error::ImportError;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub(crate) use roster::SPECIES;
pub use runner::Importer;
pub use stats::{ErrorSample, ErrorSource, ImportStats, PhaseStats};

/// Values every phase stamps on the rows it writes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PhaseContext<'a> {
    pub job_id: &'a str,
    pub shelter_id: i64,
    pub created_by: i64,
    pub now: &'a str,
}
