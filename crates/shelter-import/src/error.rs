use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ShelterImportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Submission rejected: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Job error: {0}")]
    Job(#[from] crate::job::JobError),

    #[error("Batch status error: {0}")]
    BatchStatus(#[from] crate::batch_status::BatchStatusError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to read '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Input-shape and cross-file errors found before any job exists.
///
/// `field` names the submission part at fault (`animal_csv`, `medical_csv`,
/// `medical_proofs`, `photos`, or `filters` for exports).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: file is required")]
    MissingFile { field: &'static str },

    #[error("{field}: '{filename}' must be a {expected} file")]
    InvalidExtension {
        field: &'static str,
        filename: String,
        expected: &'static str,
    },

    #[error("{field}: '{filename}' is not valid UTF-8 text")]
    NotUtf8 {
        field: &'static str,
        filename: String,
    },

    #[error("{field}: '{filename}' is {size} bytes, limit is {limit} bytes")]
    FileTooLarge {
        field: &'static str,
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("{field}: '{filename}' could not be read as CSV: {reason}")]
    MalformedTable {
        field: &'static str,
        filename: String,
        reason: String,
    },

    #[error("{field}: '{filename}' is missing required columns: {}", missing.join(", "))]
    MissingColumns {
        field: &'static str,
        filename: String,
        missing: Vec<String>,
    },

    #[error("{field}: '{filename}' contains no data rows")]
    EmptyTable {
        field: &'static str,
        filename: String,
    },

    #[error("{field}: '{filename}' has unsupported content type '{content_type}'")]
    UnsupportedContentType {
        field: &'static str,
        filename: String,
        content_type: String,
    },

    #[error("{field}: '{filename}' does not match {{animal_code}}_{{sequence}}.{{ext}}")]
    BadFilename {
        field: &'static str,
        filename: String,
    },

    #[error("photos: {total} file(s) reference animal codes missing from the roster: {}", samples.join("; "))]
    UnresolvedPhotoCodes { total: usize, samples: Vec<String> },

    #[error("filters: unknown {filter} '{value}'")]
    InvalidFilter { filter: &'static str, value: String },
}

impl ValidationError {
    /// Submission part the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingFile { field }
            | ValidationError::InvalidExtension { field, .. }
            | ValidationError::NotUtf8 { field, .. }
            | ValidationError::FileTooLarge { field, .. }
            | ValidationError::MalformedTable { field, .. }
            | ValidationError::MissingColumns { field, .. }
            | ValidationError::EmptyTable { field, .. }
            | ValidationError::UnsupportedContentType { field, .. }
            | ValidationError::BadFilename { field, .. } => field,
            ValidationError::UnresolvedPhotoCodes { .. } => "photos",
            ValidationError::InvalidFilter { .. } => "filters",
        }
    }
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Failed to stage attachment: {0}")]
    Staging(#[from] StorageError),

    #[error("Failed to record job: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to serialize job input: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Job {job_id} could not be queued and was marked failed: {source}")]
    Enqueue {
        job_id: String,
        #[source]
        source: WorkerError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{key}': {source}")]
    WriteObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read object '{key}': {source}")]
    ReadObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete object '{key}': {source}")]
    DeleteObject {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object already exists: {0}")]
    ObjectExists(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, ShelterImportError>;
