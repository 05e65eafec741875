//! Proof attachments and animal photos.

use rusqlite::{params, Connection, Row};

use super::DatabaseError;

/// Record a proof document hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOwner {
    MedicalRecord(i64),
    Animal(i64),
}

impl AttachmentOwner {
    fn columns(self) -> (&'static str, i64) {
        match self {
            AttachmentOwner::MedicalRecord(id) => ("medical_record", id),
            AttachmentOwner::Animal(id) => ("animal", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub owner: AttachmentOwner,
    pub filename: String,
    pub storage_key: String,
    pub url: String,
    pub mime_type: String,
    pub size: u64,
    pub animal_code: String,
    pub record_sequence: u32,
    pub import_job_id: String,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub attachment_id: i64,
    pub owner_type: String,
    pub owner_id: i64,
    pub filename: String,
    pub storage_key: String,
    pub url: String,
    pub mime_type: String,
    pub size: u64,
    pub animal_code: Option<String>,
    pub record_sequence: Option<u32>,
}

impl AttachmentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            attachment_id: row.get("attachment_id")?,
            owner_type: row.get("owner_type")?,
            owner_id: row.get("owner_id")?,
            filename: row.get("filename")?,
            storage_key: row.get("storage_key")?,
            url: row.get("url")?,
            mime_type: row.get("mime_type")?,
            size: row.get("size")?,
            animal_code: row.get("animal_code")?,
            record_sequence: row.get("record_sequence")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAnimalImage {
    pub animal_id: i64,
    pub url: String,
    pub storage_key: String,
    pub sort_order: u32,
    pub import_job_id: String,
}

#[derive(Debug, Clone)]
pub struct AnimalImageRow {
    pub image_id: i64,
    pub animal_id: i64,
    pub url: String,
    pub storage_key: String,
    pub sort_order: u32,
}

impl AnimalImageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            image_id: row.get("image_id")?,
            animal_id: row.get("animal_id")?,
            url: row.get("url")?,
            storage_key: row.get("storage_key")?,
            sort_order: row.get("sort_order")?,
        })
    }
}

/// Inserts a proof attachment once per (job, storage key) and returns its id.
pub fn upsert_attachment(
    conn: &Connection,
    attachment: &NewAttachment,
    now: &str,
) -> Result<i64, DatabaseError> {
    let (owner_type, owner_id) = attachment.owner.columns();
    conn.execute(
        "INSERT INTO attachments (owner_type, owner_id, filename, storage_key, url, mime_type,
         size, animal_code, record_sequence, import_job_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(import_job_id, storage_key) DO NOTHING",
        params![
            owner_type,
            owner_id,
            attachment.filename,
            attachment.storage_key,
            attachment.url,
            attachment.mime_type,
            attachment.size,
            attachment.animal_code,
            attachment.record_sequence,
            attachment.import_job_id,
            now,
        ],
    )?;
    let id = conn.query_row(
        "SELECT attachment_id FROM attachments WHERE import_job_id = ?1 AND storage_key = ?2",
        params![attachment.import_job_id, attachment.storage_key],
        |r| r.get(0),
    )?;
    Ok(id)
}

/// Inserts a photo once per (job, storage key) and returns its id.
pub fn upsert_image(
    conn: &Connection,
    image: &NewAnimalImage,
    now: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO animal_images (animal_id, url, storage_key, sort_order, import_job_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(import_job_id, storage_key) DO NOTHING",
        params![
            image.animal_id,
            image.url,
            image.storage_key,
            image.sort_order,
            image.import_job_id,
            now,
        ],
    )?;
    let id = conn.query_row(
        "SELECT image_id FROM animal_images WHERE import_job_id = ?1 AND storage_key = ?2",
        params![image.import_job_id, image.storage_key],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn attachments_by_job(
    conn: &Connection,
    job_id: &str,
) -> Result<Vec<AttachmentRow>, DatabaseError> {
    let mut stmt = conn
        .prepare("SELECT * FROM attachments WHERE import_job_id = ?1 ORDER BY attachment_id")?;
    let rows = stmt
        .query_map(params![job_id], AttachmentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Photos of one animal in display order.
pub fn images_for_animal(
    conn: &Connection,
    animal_id: i64,
) -> Result<Vec<AnimalImageRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM animal_images WHERE animal_id = ?1 ORDER BY sort_order, image_id",
    )?;
    let rows = stmt
        .query_map(params![animal_id], AnimalImageRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
