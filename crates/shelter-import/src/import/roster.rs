//! Phase 1: animals from the roster table.

use rusqlite::Connection;

use crate::correlation::CorrelationIndex;
use crate::db::animal_repo::{self, Affiliation, NewAnimal};
use crate::table::{Table, TableRow, ROSTER_COLUMNS};

use super::dates::normalize_date;
use super::stats::{ErrorSample, ErrorSource, PhaseStats};
use super::{ImportError, PhaseContext};

pub(crate) const SPECIES: &[&str] = &["CAT", "DOG"];
const SEXES: &[&str] = &["MALE", "FEMALE", "UNKNOWN"];

/// A roster row that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RosterEntry {
    pub animal_code: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub dob: String,
    pub color: String,
    pub description: String,
}

/// Validates the fields of one row. Duplicate codes are checked by the caller.
pub(crate) fn check_row(row: &TableRow) -> Result<RosterEntry, String> {
    let missing = row.missing(ROSTER_COLUMNS);
    if !missing.is_empty() {
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    }
    let field = |name: &str| row.get(name).unwrap_or_default().to_string();

    let species = field("species").to_ascii_uppercase();
    if !SPECIES.contains(&species.as_str()) {
        return Err(format!("Invalid species: {}. Must be CAT or DOG", species));
    }

    let sex = field("sex").to_ascii_uppercase();
    if !SEXES.contains(&sex.as_str()) {
        return Err(format!(
            "Invalid sex: {}. Must be MALE, FEMALE, or UNKNOWN",
            sex
        ));
    }

    let raw_dob = field("dob");
    let dob = normalize_date(&raw_dob).ok_or_else(|| {
        format!(
            "Invalid date format for dob: {}. Supported formats: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY, DD-MM-YYYY",
            raw_dob
        )
    })?;

    Ok(RosterEntry {
        animal_code: field("animal_code"),
        name: field("name"),
        species,
        breed: field("breed"),
        sex,
        dob,
        color: field("color"),
        description: field("description"),
    })
}

/// Creates one DRAFT animal per valid row and registers it in `index`.
///
/// Returns [`ImportError::CircuitBreaker`] as soon as the failed-row count
/// exceeds `max_failed_rows`; the caller rolls the phase back.
pub(crate) fn import(
    conn: &Connection,
    ctx: &PhaseContext<'_>,
    table: &Table,
    stats: &mut PhaseStats,
    index: &mut CorrelationIndex,
    max_failed_rows: u32,
) -> Result<(), ImportError> {
    for row in &table.rows {
        let row = match row {
            Ok(row) => row,
            Err(unreadable) => {
                stats.failure(ErrorSample::for_row(
                    ErrorSource::AnimalCsv,
                    unreadable.number,
                    Default::default(),
                    unreadable.reason.clone(),
                ));
                trip(stats, max_failed_rows)?;
                continue;
            }
        };

        let entry = match check_row(row) {
            Ok(entry) if index.contains_exact(&entry.animal_code) => {
                Err(format!("Duplicate animal_code: {}", entry.animal_code))
            }
            other => other,
        };

        match entry {
            Ok(entry) => {
                let animal = NewAnimal {
                    name: entry.name,
                    species: entry.species,
                    breed: Some(entry.breed),
                    sex: entry.sex,
                    dob: Some(entry.dob),
                    color: Some(entry.color),
                    description: Some(entry.description),
                    affiliation: Affiliation::Shelter(ctx.shelter_id),
                    created_by: ctx.created_by,
                    import_job_id: Some(ctx.job_id.to_string()),
                    animal_code: Some(entry.animal_code.clone()),
                };
                let id = animal_repo::upsert_imported(conn, &animal, ctx.now)?;
                index.insert(&entry.animal_code, id);
                stats.success();
            }
            Err(message) => {
                stats.failure(ErrorSample::for_row(
                    ErrorSource::AnimalCsv,
                    row.number,
                    row.fields.clone(),
                    message,
                ));
                trip(stats, max_failed_rows)?;
            }
        }
    }
    Ok(())
}

fn trip(stats: &PhaseStats, max_failed_rows: u32) -> Result<(), ImportError> {
    if stats.failed > max_failed_rows {
        return Err(ImportError::CircuitBreaker {
            failed: stats.failed,
        });
    }
    Ok(())
}
