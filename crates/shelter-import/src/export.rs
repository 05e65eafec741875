//! Shelter roster export: a shelter's animals written to CSV in object
//! storage, run as its own job type on the same job records and retries as
//! imports.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tracing::info_span;

use crate::batch_status::AnimalStatus;
use crate::broadcast::job_progress::ImportPhase;
use crate::db::animal_repo::{self, AnimalRow};
use crate::db::job_repo::JobRow;
use crate::db::{Database, DatabaseError};
use crate::error::{StorageError, ValidationError};
use crate::import::{ImportError, ProgressEvent, ProgressReporter, SPECIES};
use crate::storage::{export_key, ObjectStore};

/// Header row of every export.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "animal_id",
    "animal_code",
    "name",
    "species",
    "breed",
    "sex",
    "dob",
    "color",
    "description",
    "status",
    "created_at",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    /// Without it RETIRED animals are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Input snapshot of an export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub shelter_id: i64,
    #[serde(default)]
    pub filters: ExportFilters,
}

impl ExportRequest {
    pub fn new(shelter_id: i64) -> Self {
        Self {
            shelter_id,
            filters: ExportFilters::default(),
        }
    }

    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.filters.species = Some(species.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.filters.status = Some(status.into());
        self
    }

    /// Upper-cases filter values and rejects unknown ones. Blank values
    /// are dropped.
    pub fn normalized(mut self) -> Result<Self, ValidationError> {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_ascii_uppercase())
                .filter(|v| !v.is_empty())
        };

        self.filters.species = clean(self.filters.species.take());
        if let Some(species) = &self.filters.species {
            if !SPECIES.contains(&species.as_str()) {
                return Err(ValidationError::InvalidFilter {
                    filter: "species",
                    value: species.clone(),
                });
            }
        }

        self.filters.status = clean(self.filters.status.take());
        if let Some(status) = &self.filters.status {
            if status.parse::<AnimalStatus>().is_err() {
                return Err(ValidationError::InvalidFilter {
                    filter: "status",
                    value: status.clone(),
                });
            }
        }

        Ok(self)
    }

    pub fn from_row(row: &JobRow) -> Result<Self, DatabaseError> {
        serde_json::from_str(&row.input_snapshot).map_err(|e| DatabaseError::Corrupt {
            column: "input_snapshot",
            reason: e.to_string(),
        })
    }
}

/// Result summary of a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub category: String,
    pub message: String,
    pub total_count: u64,
    pub filename: String,
    pub file_url: String,
    pub storage_key: String,
}

#[derive(Serialize)]
struct ExportRow<'a> {
    animal_id: i64,
    animal_code: Option<&'a str>,
    name: &'a str,
    species: &'a str,
    breed: Option<&'a str>,
    sex: &'a str,
    dob: Option<&'a str>,
    color: Option<&'a str>,
    description: Option<&'a str>,
    status: &'a str,
    created_at: &'a str,
}

impl<'a> From<&'a AnimalRow> for ExportRow<'a> {
    fn from(animal: &'a AnimalRow) -> Self {
        Self {
            animal_id: animal.animal_id,
            animal_code: animal.animal_code.as_deref(),
            name: &animal.name,
            species: &animal.species,
            breed: animal.breed.as_deref(),
            sex: &animal.sex,
            dob: animal.dob.as_deref(),
            color: animal.color.as_deref(),
            description: animal.description.as_deref(),
            status: &animal.status,
            created_at: &animal.created_at,
        }
    }
}

pub struct Exporter {
    db: Database,
    store: Arc<dyn ObjectStore>,
}

impl Exporter {
    pub fn new(db: Database, store: Arc<dyn ObjectStore>) -> Self {
        Self { db, store }
    }

    /// Writes the export for `request` and returns its summary.
    ///
    /// The filename is stamped with `requested_at` (the job's creation
    /// time), so every attempt of a job writes the same key and a retry
    /// replaces what an earlier attempt left behind.
    pub fn run(
        &self,
        job_id: &str,
        request: &ExportRequest,
        requested_at: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<ExportSummary, ImportError> {
        let _span = info_span!("export",
            job_id = %job_id,
            shelter_id = request.shelter_id,
        )
        .entered();

        progress.report(ProgressEvent::Phase {
            phase: ImportPhase::Exporting,
            message: format!("Exporting animals of shelter {}", request.shelter_id),
        });

        let animals = self.db.with_conn(|conn| {
            animal_repo::list_for_export(
                conn,
                request.shelter_id,
                request.filters.species.as_deref(),
                request.filters.status.as_deref(),
            )
        })?;
        let bytes = write_csv(&animals)?;

        let filename = export_filename(request.shelter_id, requested_at);
        let key = export_key(request.shelter_id, job_id, &filename);
        match self.store.put(&key, &bytes) {
            Err(StorageError::ObjectExists(_)) => {
                self.store.delete(&key)?;
                self.store.put(&key, &bytes)?;
            }
            other => other?,
        }

        let total_count = animals.len() as u64;
        info!(
            "Exported {} animals of shelter {} to {}",
            total_count, request.shelter_id, key
        );

        Ok(ExportSummary {
            category: "success".to_string(),
            message: format!("Exported {} animals", total_count),
            total_count,
            file_url: self.store.public_url(&key),
            filename,
            storage_key: key,
        })
    }
}

fn write_csv(animals: &[AnimalRow]) -> Result<Vec<u8>, ImportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS)?;
    for animal in animals {
        writer.serialize(ExportRow::from(animal))?;
    }
    writer
        .into_inner()
        .map_err(|e| ImportError::Csv(e.into_error().into()))
}

/// `animals-export-{shelter}-{YYYYmmddHHMMSS}.csv`
fn export_filename(shelter_id: i64, requested_at: &str) -> String {
    let stamp = DateTime::parse_from_rfc3339(requested_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    format!(
        "animals-export-{}-{}.csv",
        shelter_id,
        stamp.format("%Y%m%d%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::animal_repo::{Affiliation, NewAnimal};
    use crate::import::NoopProgress;
    use crate::storage::MemoryObjectStore;

    const NOW: &str = "2026-03-04T05:06:07Z";

    fn seed(db: &Database, code: &str, species: &str, shelter_id: i64) -> i64 {
        db.with_conn(|c| {
            animal_repo::insert(
                c,
                &NewAnimal {
                    name: format!("Animal {}", code),
                    species: species.to_string(),
                    breed: None,
                    sex: "UNKNOWN".to_string(),
                    dob: None,
                    color: Some("Grey, white".to_string()),
                    description: None,
                    affiliation: Affiliation::Shelter(shelter_id),
                    created_by: 1,
                    import_job_id: None,
                    animal_code: Some(code.to_string()),
                },
                NOW,
            )
        })
        .unwrap()
    }

    #[test]
    fn test_normalized_filters() {
        let request = ExportRequest::new(3)
            .with_species(" dog ")
            .with_status("")
            .normalized()
            .unwrap();
        assert_eq!(request.filters.species.as_deref(), Some("DOG"));
        assert_eq!(request.filters.status, None);

        let err = ExportRequest::new(3).with_species("hamster").normalized().unwrap_err();
        assert_eq!(err.to_string(), "filters: unknown species 'HAMSTER'");
        assert_eq!(err.field(), "filters");
        assert!(ExportRequest::new(3).with_status("adopted").normalized().is_err());
    }

    #[test]
    fn test_export_writes_csv() {
        let db = Database::open_in_memory().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let cat = seed(&db, "001", "CAT", 3);
        seed(&db, "002", "DOG", 3);
        seed(&db, "003", "CAT", 4);

        let exporter = Exporter::new(db.clone(), store.clone());
        let summary = exporter
            .run("job-1", &ExportRequest::new(3).with_species("CAT"), NOW, &NoopProgress)
            .unwrap();

        assert_eq!(summary.total_count, 1);
        assert_eq!(summary.filename, "animals-export-3-20260304050607.csv");
        assert_eq!(
            summary.storage_key,
            "exports/3/job-1/animals-export-3-20260304050607.csv"
        );
        assert_eq!(summary.file_url, store.public_url(&summary.storage_key));

        let csv = String::from_utf8(store.get(&summary.storage_key).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(EXPORT_COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some(format!("{},001,Animal 001,CAT,,UNKNOWN,,\"Grey, white\",,DRAFT,{}", cat, NOW).as_str())
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_export_keeps_header_and_rerun_replaces() {
        let db = Database::open_in_memory().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let exporter = Exporter::new(db.clone(), store.clone());
        let request = ExportRequest::new(9);

        let first = exporter.run("job-2", &request, NOW, &NoopProgress).unwrap();
        assert_eq!(first.total_count, 0);
        assert_eq!(
            store.get(&first.storage_key).unwrap(),
            format!("{}\n", EXPORT_COLUMNS.join(",")).into_bytes()
        );

        seed(&db, "010", "DOG", 9);
        let second = exporter.run("job-2", &request, NOW, &NoopProgress).unwrap();
        assert_eq!(second.storage_key, first.storage_key);
        assert_eq!(second.total_count, 1);
        let csv = String::from_utf8(store.get(&second.storage_key).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
