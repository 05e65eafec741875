//! Job record types: status, the write-once input snapshot, and the view
//! handed to status pollers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::ImportSummary;
use crate::db::job_repo::{self, JobRow};
use crate::db::DatabaseError;
use crate::export::ExportSummary;

pub const JOB_TYPE_ANIMAL_IMPORT: &str = "animal_batch_import";
pub const JOB_TYPE_ANIMAL_EXPORT: &str = "animal_batch_export";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => job_repo::STATUS_PENDING,
            JobStatus::Running => job_repo::STATUS_RUNNING,
            JobStatus::Succeeded => job_repo::STATUS_SUCCEEDED,
            JobStatus::Failed => job_repo::STATUS_FAILED,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A tabular file carried inside the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInput {
    pub filename: String,
    pub size: u64,
    pub content: String,
}

/// A proof or photo already staged in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedAttachment {
    pub filename: String,
    pub content_type: String,
    pub size: u64,
    pub storage_key: String,
    pub url: String,
    pub animal_code: String,
    pub sequence: u32,
}

/// Everything the importer needs, captured once at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub shelter_id: i64,
    pub roster: TableInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical: Option<TableInput>,
    #[serde(default)]
    pub proofs: Vec<StagedAttachment>,
    #[serde(default)]
    pub photos: Vec<StagedAttachment>,
}

/// Result stored when the pipeline itself could not finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub category: String,
    pub message: String,
    pub has_errors: bool,
    pub error_type: String,
    pub attempts: u32,
}

impl FailureSummary {
    pub fn new(message: impl Into<String>, error_type: &str, attempts: u32) -> Self {
        Self {
            category: "failed".to_string(),
            message: message.into(),
            has_errors: true,
            error_type: error_type.to_string(),
            attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultSummary {
    Completed(ImportSummary),
    Crashed(FailureSummary),
    Exported(ExportSummary),
}

impl ResultSummary {
    pub fn category(&self) -> &str {
        match self {
            ResultSummary::Completed(summary) => summary.category.as_str(),
            ResultSummary::Crashed(failure) => failure.category.as_str(),
            ResultSummary::Exported(export) => export.category.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ResultSummary::Completed(summary) => summary.message.as_str(),
            ResultSummary::Crashed(failure) => failure.message.as_str(),
            ResultSummary::Exported(export) => export.message.as_str(),
        }
    }
}

/// A job with its snapshot decoded.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub created_by: i64,
    pub snapshot: InputSnapshot,
}

impl Job {
    pub fn from_row(row: &JobRow) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: row.id.clone(),
            status: parse_status(&row.status)?,
            created_by: row.created_by,
            snapshot: serde_json::from_str(&row.input_snapshot).map_err(|e| {
                DatabaseError::Corrupt {
                    column: "input_snapshot",
                    reason: e.to_string(),
                }
            })?,
        })
    }
}

/// What the status boundary exposes for one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub job_id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub input: serde_json::Value,
    pub result_summary: Option<ResultSummary>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl JobView {
    /// Builds the view; table contents are replaced by their size so the
    /// view stays small.
    pub fn from_row(row: &JobRow) -> Result<Self, DatabaseError> {
        let mut input: serde_json::Value =
            serde_json::from_str(&row.input_snapshot).map_err(|e| DatabaseError::Corrupt {
                column: "input_snapshot",
                reason: e.to_string(),
            })?;
        for table in ["roster", "medical"] {
            if let Some(obj) = input.get_mut(table).and_then(|t| t.as_object_mut()) {
                obj.remove("content");
            }
        }

        let result_summary = row
            .result_summary
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DatabaseError::Corrupt {
                column: "result_summary",
                reason: e.to_string(),
            })?;

        Ok(Self {
            job_id: row.id.clone(),
            job_type: row.job_type.clone(),
            status: parse_status(&row.status)?,
            input,
            result_summary,
            created_at: row.created_at.clone(),
            started_at: row.started_at.clone(),
            completed_at: row.completed_at.clone(),
            attempts: row.attempts,
            last_error: row.last_error.clone(),
        })
    }
}

fn parse_status(status: &str) -> Result<JobStatus, DatabaseError> {
    status.parse().map_err(|reason| DatabaseError::Corrupt {
        column: "status",
        reason,
    })
}
