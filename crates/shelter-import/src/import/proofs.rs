//! Phase 3: proof documents.
//!
//! A proof hangs off the medical entry matching its `(animal, sequence)`
//! pair and falls back to the animal itself when the medical file had no
//! such entry.

use rusqlite::Connection;

use crate::correlation::CorrelationIndex;
use crate::db::attachment_repo::{self, AttachmentOwner, NewAttachment};
use crate::job::model::StagedAttachment;
use crate::storage::ObjectStore;

use super::error::ItemError;
use super::medical::MedicalIndex;
use super::stats::{ErrorSample, ErrorSource, PhaseStats};
use super::PhaseContext;

pub(crate) fn import(
    conn: &Connection,
    ctx: &PhaseContext<'_>,
    proofs: &[StagedAttachment],
    stats: &mut PhaseStats,
    index: &CorrelationIndex,
    entries: &MedicalIndex,
    store: &dyn ObjectStore,
) {
    for proof in proofs {
        match attach(conn, ctx, proof, index, entries, store) {
            Ok(owner) => {
                log::debug!("Attached proof {} to {:?}", proof.filename, owner);
                stats.success();
            }
            Err(e) => {
                stats.failure(ErrorSample::for_item(
                    ErrorSource::MedicalProof,
                    &proof.filename,
                    e.to_string(),
                ));
            }
        }
    }
}

fn attach(
    conn: &Connection,
    ctx: &PhaseContext<'_>,
    proof: &StagedAttachment,
    index: &CorrelationIndex,
    entries: &MedicalIndex,
    store: &dyn ObjectStore,
) -> Result<AttachmentOwner, ItemError> {
    let animal_id = index.resolve(&proof.animal_code)?.id;
    ItemError::check_staged(store, &proof.storage_key, proof.size)?;

    let owner = match entries.get(&(animal_id, proof.sequence)) {
        Some(&record_id) => AttachmentOwner::MedicalRecord(record_id),
        None => AttachmentOwner::Animal(animal_id),
    };

    attachment_repo::upsert_attachment(
        conn,
        &NewAttachment {
            owner,
            filename: proof.filename.clone(),
            storage_key: proof.storage_key.clone(),
            url: proof.url.clone(),
            mime_type: proof.content_type.clone(),
            size: proof.size,
            animal_code: proof.animal_code.clone(),
            record_sequence: proof.sequence,
            import_job_id: ctx.job_id.to_string(),
        },
        ctx.now,
    )?;
    Ok(owner)
}
