use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::broadcast::job_progress::ImportPhase;
use crate::config::Limits;
use crate::correlation::CorrelationIndex;
use crate::db::Database;
use crate::job::model::Job;
use crate::storage::ObjectStore;
use crate::table::{self, Table};

use super::medical::MedicalIndex;
use super::progress::{ProgressEvent, ProgressReporter};
use super::stats::ImportStats;
use super::{medical, photos, proofs, roster, ImportError, PhaseContext};

/// Runs the four import phases of one job, strictly in order.
///
/// Each phase commits in its own transaction, so work from earlier phases
/// survives a failure in a later one. Row and item failures are counted in
/// the returned [`ImportStats`]; only infrastructure failures and the roster
/// circuit breaker surface as [`ImportError`].
pub struct Importer {
    db: Database,
    store: Arc<dyn ObjectStore>,
    limits: Limits,
}

impl Importer {
    pub fn new(db: Database, store: Arc<dyn ObjectStore>, limits: Limits) -> Self {
        Self { db, store, limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn run(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<ImportStats, ImportError> {
        let snapshot = &job.snapshot;
        let _import_span = info_span!("import",
            job_id = %job.id,
            shelter_id = snapshot.shelter_id,
        )
        .entered();

        let now = chrono::Utc::now().to_rfc3339();
        let ctx = PhaseContext {
            job_id: &job.id,
            shelter_id: snapshot.shelter_id,
            created_by: job.created_by,
            now: &now,
        };
        let mut stats = ImportStats::new(self.limits.max_error_samples);
        let mut index = CorrelationIndex::new();

        // Phase 1: roster
        {
            let _phase = info_span!("roster").entered();
            progress.report(ProgressEvent::Phase {
                phase: ImportPhase::Roster,
                message: format!("Importing animals from {}", snapshot.roster.filename),
            });
            let table = parse_input(&snapshot.roster.filename, &snapshot.roster.content)?;
            let result = self.db.transaction(|conn| {
                roster::import(
                    conn,
                    &ctx,
                    &table,
                    &mut stats.animals,
                    &mut index,
                    self.limits.max_failed_rows,
                )
            });

            match result {
                Ok(()) => info!(
                    "Roster phase: {}/{} animals created",
                    stats.animals.succeeded, stats.animals.attempted
                ),
                Err(ImportError::CircuitBreaker { failed }) => {
                    warn!("Roster phase aborted after {} failed rows", failed);
                    stats.animals.aborted = true;
                    stats.animals.succeeded = 0;
                    index.clear();
                    return Ok(stats);
                }
                Err(e) => return Err(e),
            }
        }

        // Phase 2: medical history
        let mut entries = MedicalIndex::new();
        if let Some(medical_input) = &snapshot.medical {
            let _phase = info_span!("medical").entered();
            progress.report(ProgressEvent::Phase {
                phase: ImportPhase::MedicalHistory,
                message: format!("Importing medical history from {}", medical_input.filename),
            });
            let table = parse_input(&medical_input.filename, &medical_input.content)?;
            self.db.transaction(|conn| {
                medical::import(
                    conn,
                    &ctx,
                    &table,
                    &mut stats.medical_records,
                    &index,
                    &mut entries,
                )
            })?;
            info!(
                "Medical phase: {}/{} records created",
                stats.medical_records.succeeded, stats.medical_records.attempted
            );
        }

        // Phase 3: proofs
        if !snapshot.proofs.is_empty() {
            let _phase = info_span!("proofs").entered();
            progress.report(ProgressEvent::Phase {
                phase: ImportPhase::Proofs,
                message: format!("Attaching {} medical proofs", snapshot.proofs.len()),
            });
            self.db.transaction(|conn| {
                proofs::import(
                    conn,
                    &ctx,
                    &snapshot.proofs,
                    &mut stats.medical_proofs,
                    &index,
                    &entries,
                    self.store.as_ref(),
                );
                Ok::<_, ImportError>(())
            })?;
            info!(
                "Proof phase: {}/{} proofs attached",
                stats.medical_proofs.succeeded, stats.medical_proofs.attempted
            );
        }

        // Phase 4: photos
        if !snapshot.photos.is_empty() {
            let _phase = info_span!("photos").entered();
            progress.report(ProgressEvent::Phase {
                phase: ImportPhase::Photos,
                message: format!("Attaching {} photos", snapshot.photos.len()),
            });
            self.db.transaction(|conn| {
                photos::import(
                    conn,
                    &ctx,
                    &snapshot.photos,
                    &mut stats.photos,
                    &index,
                    self.store.as_ref(),
                );
                Ok::<_, ImportError>(())
            })?;
            info!(
                "Photo phase: {}/{} photos attached",
                stats.photos.succeeded, stats.photos.attempted
            );
        }

        Ok(stats)
    }
}

/// Tables were checked at submission; failing here means the snapshot
/// itself is broken, which no retry can fix.
fn parse_input(filename: &str, content: &str) -> Result<Table, ImportError> {
    table::parse(content)
        .map_err(|e| ImportError::InvalidInput(format!("{} is not readable: {}", filename, e)))
}
