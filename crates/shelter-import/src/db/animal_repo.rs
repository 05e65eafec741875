//! Animal repository.
//!
//! Every write keeps exactly one of `shelter_id` / `owner_id` set; callers
//! express that through [`Affiliation`], and the table CHECK constraint backs
//! it up.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// Who an animal belongs to. Exactly one side is ever recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affiliation {
    Shelter(i64),
    Owner(i64),
}

impl Affiliation {
    /// `(shelter_id, owner_id)` column values.
    fn columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            Affiliation::Shelter(id) => (Some(id), None),
            Affiliation::Owner(id) => (None, Some(id)),
        }
    }
}

/// Values for a new animal row.
#[derive(Debug, Clone)]
pub struct NewAnimal {
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: String,
    pub dob: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub affiliation: Affiliation,
    pub created_by: i64,
    pub import_job_id: Option<String>,
    pub animal_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnimalRow {
    pub animal_id: i64,
    pub name: String,
    pub species: String,
    pub breed: Option<String>,
    pub sex: String,
    pub dob: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub shelter_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub created_by: i64,
    pub import_job_id: Option<String>,
    pub animal_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AnimalRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            animal_id: row.get("animal_id")?,
            name: row.get("name")?,
            species: row.get("species")?,
            breed: row.get("breed")?,
            sex: row.get("sex")?,
            dob: row.get("dob")?,
            color: row.get("color")?,
            description: row.get("description")?,
            status: row.get("status")?,
            shelter_id: row.get("shelter_id")?,
            owner_id: row.get("owner_id")?,
            created_by: row.get("created_by")?,
            import_job_id: row.get("import_job_id")?,
            animal_code: row.get("animal_code")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn affiliation(&self) -> Result<Affiliation, DatabaseError> {
        match (self.shelter_id, self.owner_id) {
            (Some(id), None) => Ok(Affiliation::Shelter(id)),
            (None, Some(id)) => Ok(Affiliation::Owner(id)),
            _ => Err(DatabaseError::Corrupt {
                column: "shelter_id/owner_id",
                reason: format!("animal {} must have exactly one affiliation", self.animal_id),
            }),
        }
    }
}

/// Inserts an animal in DRAFT status and returns its id.
pub fn insert(conn: &Connection, animal: &NewAnimal, now: &str) -> Result<i64, DatabaseError> {
    let (shelter_id, owner_id) = animal.affiliation.columns();
    conn.execute(
        "INSERT INTO animals (name, species, breed, sex, dob, color, description, status,
         shelter_id, owner_id, created_by, import_job_id, animal_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'DRAFT', ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            animal.name,
            animal.species,
            animal.breed,
            animal.sex,
            animal.dob,
            animal.color,
            animal.description,
            shelter_id,
            owner_id,
            animal.created_by,
            animal.import_job_id,
            animal.animal_code,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts an imported animal unless the same job already created one for
/// this code, and returns the id either way.
pub fn upsert_imported(
    conn: &Connection,
    animal: &NewAnimal,
    now: &str,
) -> Result<i64, DatabaseError> {
    let (shelter_id, owner_id) = animal.affiliation.columns();
    conn.execute(
        "INSERT INTO animals (name, species, breed, sex, dob, color, description, status,
         shelter_id, owner_id, created_by, import_job_id, animal_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'DRAFT', ?8, ?9, ?10, ?11, ?12, ?13, ?13)
         ON CONFLICT(import_job_id, animal_code) DO NOTHING",
        params![
            animal.name,
            animal.species,
            animal.breed,
            animal.sex,
            animal.dob,
            animal.color,
            animal.description,
            shelter_id,
            owner_id,
            animal.created_by,
            animal.import_job_id,
            animal.animal_code,
            now,
        ],
    )?;
    let id = conn.query_row(
        "SELECT animal_id FROM animals WHERE import_job_id = ?1 AND animal_code = ?2",
        params![animal.import_job_id, animal.animal_code],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn find_by_id(conn: &Connection, animal_id: i64) -> Result<Option<AnimalRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM animals WHERE animal_id = ?1",
            params![animal_id],
            AnimalRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Animals created by one import job, in creation order.
pub fn list_by_job(conn: &Connection, job_id: &str) -> Result<Vec<AnimalRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM animals WHERE import_job_id = ?1 ORDER BY animal_id")?;
    let rows = stmt
        .query_map(params![job_id], AnimalRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Animals of a shelter for export, in id order.
///
/// Without a status filter RETIRED animals are left out.
pub fn list_for_export(
    conn: &Connection,
    shelter_id: i64,
    species: Option<&str>,
    status: Option<&str>,
) -> Result<Vec<AnimalRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM animals
         WHERE shelter_id = ?1
           AND (?2 IS NULL OR species = ?2)
           AND ((?3 IS NULL AND status <> 'RETIRED') OR status = ?3)
         ORDER BY animal_id",
    )?;
    let rows = stmt
        .query_map(params![shelter_id, species, status], AnimalRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Returns the subset of `ids` that belong to the shelter.
pub fn ids_in_shelter(
    conn: &Connection,
    shelter_id: i64,
    ids: &[i64],
) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT animal_id FROM animals WHERE animal_id = ?1 AND shelter_id = ?2")?;
    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(id) = stmt
            .query_row(params![id, shelter_id], |r| r.get::<_, i64>(0))
            .optional()?
        {
            found.push(id);
        }
    }
    Ok(found)
}

pub fn update_status(
    conn: &Connection,
    animal_id: i64,
    status: &str,
    now: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE animals SET status = ?2, updated_at = ?3 WHERE animal_id = ?1",
        params![animal_id, status, now],
    )?;
    Ok(())
}

/// Moves an animal to a new shelter or owner, clearing the other side.
pub fn reassign(
    conn: &Connection,
    animal_id: i64,
    affiliation: Affiliation,
    now: &str,
) -> Result<(), DatabaseError> {
    let (shelter_id, owner_id) = affiliation.columns();
    conn.execute(
        "UPDATE animals SET shelter_id = ?2, owner_id = ?3, updated_at = ?4 WHERE animal_id = ?1",
        params![animal_id, shelter_id, owner_id, now],
    )?;
    Ok(())
}
