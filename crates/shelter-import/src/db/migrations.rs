//! Schema migrations.
//!
//! Applied versions are tracked in a `_migrations` table; pending ones run
//! in order, each at most once.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_import_jobs_table",
        sql: include_str!("sql/001_create_import_jobs.sql"),
    },
    Migration {
        version: 2,
        description: "create_animals_table",
        sql: include_str!("sql/002_create_animals.sql"),
    },
    Migration {
        version: 3,
        description: "create_medical_records_table",
        sql: include_str!("sql/003_create_medical_records.sql"),
    },
    Migration {
        version: 4,
        description: "create_attachments_table",
        sql: include_str!("sql/004_create_attachments.sql"),
    },
    Migration {
        version: 5,
        description: "create_animal_images_table",
        sql: include_str!("sql/005_create_animal_images.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}
