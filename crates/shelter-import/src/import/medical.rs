//! Phase 2: medical history rows correlated to phase-1 animals.

use std::collections::HashMap;

use rusqlite::Connection;

use crate::correlation::{CorrelationError, CorrelationIndex};
use crate::db::medical_repo::{self, NewMedicalRecord};
use crate::table::{Table, TableRow, MEDICAL_COLUMNS};

use super::dates::normalize_date;
use super::stats::{ErrorSample, ErrorSource, PhaseStats};
use super::{ImportError, PhaseContext};

const RECORD_TYPES: &[&str] = &["TREATMENT", "CHECKUP", "VACCINE", "SURGERY", "OTHER"];

/// Medical entry ids keyed by `(animal_id, record_sequence)`.
pub(crate) type MedicalIndex = HashMap<(i64, u32), i64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MedicalEntry {
    pub animal_id: i64,
    pub record_type: String,
    pub record_date: String,
    pub record_sequence: u32,
    pub provider: Option<String>,
    pub details: Option<String>,
}

pub(crate) fn check_row(row: &TableRow, index: &CorrelationIndex) -> Result<MedicalEntry, String> {
    let missing = row.missing(MEDICAL_COLUMNS);
    if !missing.is_empty() {
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    }

    let code = row.get("animal_code").unwrap_or_default();
    let animal_id = index
        .resolve(code)
        .map_err(|e| match e {
            CorrelationError::NotFound(code) => format!(
                "Unknown animal_code: {}. Animal not found in animal_csv",
                code
            ),
            ambiguous => ambiguous.to_string(),
        })?
        .id;

    let record_type = row.get("record_type").unwrap_or_default().to_ascii_uppercase();
    if !RECORD_TYPES.contains(&record_type.as_str()) {
        return Err(format!("Invalid record_type: {}", record_type));
    }

    let record_sequence = match row.get("record_sequence") {
        None => 1,
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            format!("Invalid record_sequence: {}. Must be a number", raw)
        })?,
    };

    let raw_date = row.get("date").unwrap_or_default();
    let record_date = normalize_date(raw_date).ok_or_else(|| {
        format!(
            "Invalid date format for medical record: {}. Supported formats: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY, DD-MM-YYYY",
            raw_date
        )
    })?;

    Ok(MedicalEntry {
        animal_id,
        record_type,
        record_date,
        record_sequence,
        provider: row.get("provider").map(str::to_string),
        details: row.get("details").map(str::to_string),
    })
}

/// Creates one unverified medical entry per valid row. Later rows sharing
/// an `(animal, sequence)` pair replace earlier ones in `entries`.
pub(crate) fn import(
    conn: &Connection,
    ctx: &PhaseContext<'_>,
    table: &Table,
    stats: &mut PhaseStats,
    index: &CorrelationIndex,
    entries: &mut MedicalIndex,
) -> Result<(), ImportError> {
    for row in &table.rows {
        let row = match row {
            Ok(row) => row,
            Err(unreadable) => {
                stats.failure(ErrorSample::for_row(
                    ErrorSource::MedicalCsv,
                    unreadable.number,
                    Default::default(),
                    unreadable.reason.clone(),
                ));
                continue;
            }
        };

        match check_row(row, index) {
            Ok(entry) => {
                let record = NewMedicalRecord {
                    animal_id: entry.animal_id,
                    record_type: entry.record_type,
                    record_date: entry.record_date,
                    record_sequence: entry.record_sequence,
                    provider: entry.provider,
                    details: entry.details,
                    created_by: ctx.created_by,
                    import_job_id: ctx.job_id.to_string(),
                    source_row: row.number,
                };
                let id = medical_repo::upsert_imported(conn, &record, ctx.now)?;
                entries.insert((entry.animal_id, entry.record_sequence), id);
                stats.success();
            }
            Err(message) => {
                stats.failure(ErrorSample::for_row(
                    ErrorSource::MedicalCsv,
                    row.number,
                    row.fields.clone(),
                    message,
                ));
            }
        }
    }
    Ok(())
}
