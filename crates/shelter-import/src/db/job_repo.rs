//! Job repository for the `import_jobs` table.
//!
//! Status changes are conditional updates, so a row can only move
//! PENDING -> RUNNING -> SUCCEEDED | FAILED. The input snapshot is written
//! by `insert` and never touched again.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_SUCCEEDED: &str = "SUCCEEDED";
pub const STATUS_FAILED: &str = "FAILED";

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub input_snapshot: String,
    pub result_summary: Option<String>,
    pub created_by: i64,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_type: row.get("job_type")?,
            status: row.get("status")?,
            input_snapshot: row.get("input_snapshot")?,
            result_summary: row.get("result_summary")?,
            created_by: row.get("created_by")?,
            attempts: row.get("attempts")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status == STATUS_SUCCEEDED || self.status == STATUS_FAILED
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<String>,
    pub created_by: Option<i64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO import_jobs (id, job_type, status, input_snapshot, result_summary,
             created_by, attempts, last_error, created_at, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.job_type,
                job.status,
                job.input_snapshot,
                job.result_summary,
                job.created_by,
                job.attempts,
                job.last_error,
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM import_jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Queries jobs with filters, newest first, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(created_by) = filter.created_by {
            conditions.push(format!("created_by = ?{}", param_values.len() + 1));
            param_values.push(Box::new(created_by));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM import_jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM import_jobs {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM import_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Claims the next attempt of a job and returns its 1-based attempt number.
///
/// `claimed` is the attempt count the caller last saw. A PENDING job becomes
/// RUNNING with `started_at` set; a RUNNING job only has its attempt counter
/// bumped. If another delivery bumped the counter in the meantime the claim
/// fails with [`DatabaseError::ClaimLost`]. Terminal jobs are rejected.
pub fn begin_attempt(
    db: &Database,
    id: &str,
    now: &str,
    claimed: u32,
) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs
             SET status = 'RUNNING', started_at = COALESCE(started_at, ?2), attempts = attempts + 1
             WHERE id = ?1 AND status IN ('PENDING', 'RUNNING') AND attempts = ?3",
            params![id, now, claimed],
        )?;
        if changed == 0 {
            return Err(claim_error(conn, id, STATUS_RUNNING, claimed)?);
        }
        Ok(claimed + 1)
    })
}

/// Records the error of a failed attempt on a job that is still running
/// under the caller's claim.
pub fn record_attempt_error(
    db: &Database,
    id: &str,
    message: &str,
    claimed: u32,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE import_jobs SET last_error = ?2
             WHERE id = ?1 AND status = 'RUNNING' AND attempts = ?3",
            params![id, message, claimed],
        )?;
        Ok(())
    })
}

/// Moves a RUNNING job to a terminal status and stores its result summary.
///
/// Succeeds at most once per job: the summary column must still be empty
/// and the attempt count must still be the caller's `claimed` one.
pub fn complete(
    db: &Database,
    id: &str,
    status: &str,
    result_summary: &str,
    completed_at: &str,
    claimed: u32,
) -> Result<(), DatabaseError> {
    if status != STATUS_SUCCEEDED && status != STATUS_FAILED {
        return Err(DatabaseError::InvalidTransition {
            id: id.to_string(),
            from: STATUS_RUNNING.to_string(),
            to: status.to_string(),
        });
    }
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE import_jobs SET status = ?2, result_summary = ?3, completed_at = ?4
             WHERE id = ?1 AND status = 'RUNNING' AND result_summary IS NULL AND attempts = ?5",
            params![id, status, result_summary, completed_at, claimed],
        )?;
        if changed == 0 {
            return Err(claim_error(conn, id, status, claimed)?);
        }
        Ok(())
    })
}

/// Fails a job that can no longer be run, passing through RUNNING when it
/// never started. The attempt count is left as is.
pub fn abandon(
    db: &Database,
    id: &str,
    result_summary: &str,
    now: &str,
) -> Result<(), DatabaseError> {
    db.transaction(|conn| {
        conn.execute(
            "UPDATE import_jobs SET status = 'RUNNING', started_at = COALESCE(started_at, ?2)
             WHERE id = ?1 AND status = 'PENDING'",
            params![id, now],
        )?;
        let changed = conn.execute(
            "UPDATE import_jobs SET status = 'FAILED', result_summary = ?3, completed_at = ?2
             WHERE id = ?1 AND status = 'RUNNING' AND result_summary IS NULL",
            params![id, now, result_summary],
        )?;
        if changed == 0 {
            return Err(transition_error(conn, id, STATUS_FAILED)?);
        }
        Ok(())
    })
}

/// Jobs that are PENDING or RUNNING, oldest first.
pub fn list_unfinished(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM import_jobs WHERE status IN ('PENDING', 'RUNNING')
             ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Distinguishes a claim taken over by another delivery from an illegal
/// status change.
fn claim_error(
    conn: &rusqlite::Connection,
    id: &str,
    to: &str,
    claimed: u32,
) -> Result<DatabaseError, DatabaseError> {
    let attempts: Option<u32> = conn
        .query_row(
            "SELECT attempts FROM import_jobs WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    match attempts {
        Some(attempts) if attempts != claimed => Ok(DatabaseError::ClaimLost {
            id: id.to_string(),
            claimed,
            current: attempts,
        }),
        _ => transition_error(conn, id, to),
    }
}

fn transition_error(
    conn: &rusqlite::Connection,
    id: &str,
    to: &str,
) -> Result<DatabaseError, DatabaseError> {
    let from: Option<String> = conn
        .query_row(
            "SELECT status FROM import_jobs WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(DatabaseError::InvalidTransition {
        id: id.to_string(),
        from: from.unwrap_or_else(|| "missing".to_string()),
        to: to.to_string(),
    })
}
