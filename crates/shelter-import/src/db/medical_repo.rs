//! Medical record repository.

use rusqlite::{params, Connection, Row};

use super::DatabaseError;

#[derive(Debug, Clone)]
pub struct NewMedicalRecord {
    pub animal_id: i64,
    pub record_type: String,
    pub record_date: String,
    pub record_sequence: u32,
    pub provider: Option<String>,
    pub details: Option<String>,
    pub created_by: i64,
    pub import_job_id: String,
    /// 1-based data row in the medical file.
    pub source_row: u32,
}

#[derive(Debug, Clone)]
pub struct MedicalRecordRow {
    pub medical_record_id: i64,
    pub animal_id: i64,
    pub record_type: String,
    pub record_date: String,
    pub record_sequence: u32,
    pub provider: Option<String>,
    pub details: Option<String>,
    pub verified: bool,
    pub source_row: Option<u32>,
}

impl MedicalRecordRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            medical_record_id: row.get("medical_record_id")?,
            animal_id: row.get("animal_id")?,
            record_type: row.get("record_type")?,
            record_date: row.get("record_date")?,
            record_sequence: row.get("record_sequence")?,
            provider: row.get("provider")?,
            details: row.get("details")?,
            verified: row.get("verified")?,
            source_row: row.get("source_row")?,
        })
    }
}

/// Inserts an unverified entry unless this job already imported the same
/// source row, and returns the entry id.
pub fn upsert_imported(
    conn: &Connection,
    record: &NewMedicalRecord,
    now: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (animal_id, record_type, record_date, record_sequence,
         provider, details, verified, created_by, import_job_id, source_row, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10)
         ON CONFLICT(import_job_id, source_row) DO NOTHING",
        params![
            record.animal_id,
            record.record_type,
            record.record_date,
            record.record_sequence,
            record.provider,
            record.details,
            record.created_by,
            record.import_job_id,
            record.source_row,
            now,
        ],
    )?;
    let id = conn.query_row(
        "SELECT medical_record_id FROM medical_records WHERE import_job_id = ?1 AND source_row = ?2",
        params![record.import_job_id, record.source_row],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn list_for_animal(
    conn: &Connection,
    animal_id: i64,
) -> Result<Vec<MedicalRecordRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM medical_records WHERE animal_id = ?1 ORDER BY record_sequence, medical_record_id",
    )?;
    let rows = stmt
        .query_map(params![animal_id], MedicalRecordRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_by_job(conn: &Connection, job_id: &str) -> Result<u64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM medical_records WHERE import_job_id = ?1",
        params![job_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::animal_repo::{self, Affiliation, NewAnimal};
    use crate::db::Database;

    const NOW: &str = "2026-01-01T00:00:00Z";

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let animal_id = db
            .with_conn(|c| {
                c.execute(
                    "INSERT INTO import_jobs (id, job_type, status, input_snapshot, created_by, created_at)
                     VALUES ('job-m', 'animal_batch_import', 'RUNNING', '{}', 1, ?1)",
                    params![NOW],
                )?;
                animal_repo::insert(
                    c,
                    &NewAnimal {
                        name: "Rex".to_string(),
                        species: "DOG".to_string(),
                        breed: None,
                        sex: "MALE".to_string(),
                        dob: None,
                        color: None,
                        description: None,
                        affiliation: Affiliation::Shelter(1),
                        created_by: 1,
                        import_job_id: Some("job-m".to_string()),
                        animal_code: Some("R1".to_string()),
                    },
                    NOW,
                )
            })
            .unwrap();
        (db, animal_id)
    }

    fn record(animal_id: i64, source_row: u32, sequence: u32) -> NewMedicalRecord {
        NewMedicalRecord {
            animal_id,
            record_type: "VACCINE".to_string(),
            record_date: "2025-03-04".to_string(),
            record_sequence: sequence,
            provider: Some("City Vet".to_string()),
            details: None,
            created_by: 1,
            import_job_id: "job-m".to_string(),
            source_row,
        }
    }

    #[test]
    fn test_upsert_is_keyed_by_source_row() {
        let (db, animal_id) = setup();
        db.with_conn(|c| {
            let a = upsert_imported(c, &record(animal_id, 1, 1), NOW)?;
            let b = upsert_imported(c, &record(animal_id, 2, 2), NOW)?;
            let a_again = upsert_imported(c, &record(animal_id, 1, 1), NOW)?;
            assert_ne!(a, b);
            assert_eq!(a, a_again);
            assert_eq!(count_by_job(c, "job-m")?, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_entries_start_unverified() {
        let (db, animal_id) = setup();
        db.with_conn(|c| {
            upsert_imported(c, &record(animal_id, 1, 3), NOW)?;
            let rows = list_for_animal(c, animal_id)?;
            assert_eq!(rows.len(), 1);
            assert!(!rows[0].verified);
            assert_eq!(rows[0].record_sequence, 3);
            Ok(())
        })
        .unwrap();
    }
}
