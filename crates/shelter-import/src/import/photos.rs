//! Phase 4: animal photos, ordered by the sequence in their filename.

use rusqlite::Connection;

use crate::correlation::CorrelationIndex;
use crate::db::attachment_repo::{self, NewAnimalImage};
use crate::job::model::StagedAttachment;
use crate::storage::ObjectStore;

use super::error::ItemError;
use super::stats::{ErrorSample, ErrorSource, PhaseStats};
use super::PhaseContext;

pub(crate) fn import(
    conn: &Connection,
    ctx: &PhaseContext<'_>,
    photos: &[StagedAttachment],
    stats: &mut PhaseStats,
    index: &CorrelationIndex,
    store: &dyn ObjectStore,
) {
    for photo in photos {
        match attach(conn, ctx, photo, index, store) {
            Ok(_) => stats.success(),
            Err(e) => stats.failure(ErrorSample::for_item(
                ErrorSource::Photo,
                &photo.filename,
                e.to_string(),
            )),
        }
    }
}

fn attach(
    conn: &Connection,
    ctx: &PhaseContext<'_>,
    photo: &StagedAttachment,
    index: &CorrelationIndex,
    store: &dyn ObjectStore,
) -> Result<i64, ItemError> {
    let animal_id = index.resolve(&photo.animal_code)?.id;
    ItemError::check_staged(store, &photo.storage_key, photo.size)?;

    let id = attachment_repo::upsert_image(
        conn,
        &NewAnimalImage {
            animal_id,
            url: photo.url.clone(),
            storage_key: photo.storage_key.clone(),
            sort_order: photo.sequence,
            import_job_id: ctx.job_id.to_string(),
        },
        ctx.now,
    )?;
    Ok(id)
}
