//! Pre-flight checks on a raw submission.
//!
//! Nothing is written before these pass: no blob is staged and no job row
//! exists for a rejected submission.

use crate::config::Limits;
use crate::correlation::CorrelationIndex;
use crate::error::ValidationError;
use crate::job::model::TableInput;
use crate::table::{self, MEDICAL_COLUMNS, ROSTER_COLUMNS};

use super::filename::{parse_photo_name, parse_proof_name, AttachmentName};
use super::{Submission, UploadedFile};

pub const FIELD_ROSTER: &str = "animal_csv";
pub const FIELD_MEDICAL: &str = "medical_csv";
pub const FIELD_PROOFS: &str = "medical_proofs";
pub const FIELD_PHOTOS: &str = "photos";

const PROOF_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/jpg",
    "image/png",
];

/// A proof or photo that passed size, type and filename checks.
#[derive(Debug, Clone)]
pub struct CheckedAttachment<'a> {
    pub file: &'a UploadedFile,
    pub name: AttachmentName,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ValidatedSubmission<'a> {
    pub roster: TableInput,
    pub medical: Option<TableInput>,
    pub proofs: Vec<CheckedAttachment<'a>>,
    pub photos: Vec<CheckedAttachment<'a>>,
}

pub fn validate<'a>(
    submission: &'a Submission,
    limits: &Limits,
) -> Result<ValidatedSubmission<'a>, ValidationError> {
    let roster = submission
        .roster
        .as_ref()
        .ok_or(ValidationError::MissingFile { field: FIELD_ROSTER })?;
    let (roster, roster_codes) = check_table(roster, FIELD_ROSTER, ROSTER_COLUMNS, true, limits)?;

    let medical = submission
        .medical
        .as_ref()
        .map(|file| check_table(file, FIELD_MEDICAL, MEDICAL_COLUMNS, false, limits))
        .transpose()?
        .map(|(table, _)| table);

    let proofs = submission
        .proofs
        .iter()
        .map(|file| {
            check_attachment(
                file,
                FIELD_PROOFS,
                limits.max_proof_bytes,
                |ct| PROOF_CONTENT_TYPES.contains(&ct),
                parse_proof_name,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let photos = submission
        .photos
        .iter()
        .map(|file| {
            check_attachment(
                file,
                FIELD_PHOTOS,
                limits.max_photo_bytes,
                |ct| ct.starts_with("image/"),
                parse_photo_name,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    check_photo_codes(&photos, &roster_codes, limits.max_prevalidation_samples)?;

    Ok(ValidatedSubmission {
        roster,
        medical,
        proofs,
        photos,
    })
}

/// Checks a CSV upload and returns it with the non-blank `animal_code`
/// values in row order.
fn check_table(
    file: &UploadedFile,
    field: &'static str,
    required: &[&str],
    require_rows: bool,
    limits: &Limits,
) -> Result<(TableInput, Vec<String>), ValidationError> {
    if !file.filename.to_ascii_lowercase().ends_with(".csv") {
        return Err(ValidationError::InvalidExtension {
            field,
            filename: file.filename.clone(),
            expected: "CSV",
        });
    }

    if file.size() > limits.max_table_bytes {
        return Err(ValidationError::FileTooLarge {
            field,
            filename: file.filename.clone(),
            size: file.size(),
            limit: limits.max_table_bytes,
        });
    }

    let content = std::str::from_utf8(&file.bytes).map_err(|_| ValidationError::NotUtf8 {
        field,
        filename: file.filename.clone(),
    })?;

    let parsed = table::parse(content).map_err(|e| ValidationError::MalformedTable {
        field,
        filename: file.filename.clone(),
        reason: e.to_string(),
    })?;

    let missing = parsed.missing_columns(required);
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns {
            field,
            filename: file.filename.clone(),
            missing,
        });
    }

    if require_rows && parsed.rows.is_empty() {
        return Err(ValidationError::EmptyTable {
            field,
            filename: file.filename.clone(),
        });
    }

    let codes = parsed
        .rows
        .iter()
        .filter_map(|row| row.as_ref().ok())
        .filter_map(|row| row.get("animal_code"))
        .map(str::to_string)
        .collect();

    Ok((
        TableInput {
            filename: file.filename.clone(),
            size: file.size(),
            content: content.to_string(),
        },
        codes,
    ))
}

fn check_attachment<'a>(
    file: &'a UploadedFile,
    field: &'static str,
    max_bytes: u64,
    allowed: impl Fn(&str) -> bool,
    parse_name: fn(&str) -> Option<AttachmentName>,
) -> Result<CheckedAttachment<'a>, ValidationError> {
    if file.size() > max_bytes {
        return Err(ValidationError::FileTooLarge {
            field,
            filename: file.filename.clone(),
            size: file.size(),
            limit: max_bytes,
        });
    }

    let content_type = file.effective_content_type();
    if !allowed(&content_type) {
        return Err(ValidationError::UnsupportedContentType {
            field,
            filename: file.filename.clone(),
            content_type,
        });
    }

    let name = parse_name(&file.filename).ok_or_else(|| ValidationError::BadFilename {
        field,
        filename: file.filename.clone(),
    })?;

    Ok(CheckedAttachment {
        file,
        name,
        content_type,
    })
}

/// Every photo must resolve against the roster before anything is imported.
fn check_photo_codes(
    photos: &[CheckedAttachment<'_>],
    roster_codes: &[String],
    max_samples: usize,
) -> Result<(), ValidationError> {
    if photos.is_empty() {
        return Ok(());
    }

    let mut index = CorrelationIndex::new();
    for (position, code) in roster_codes.iter().enumerate() {
        index.insert(code, position as i64);
    }

    let failures: Vec<String> = photos
        .iter()
        .filter_map(|photo| {
            index
                .resolve(&photo.name.animal_code)
                .err()
                .map(|e| format!("{}: {}", photo.file.filename, e))
        })
        .collect();

    if failures.is_empty() {
        return Ok(());
    }

    Err(ValidationError::UnresolvedPhotoCodes {
        total: failures.len(),
        samples: failures.into_iter().take(max_samples).collect(),
    })
}
