//! Per-phase counters and capped error samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Input a captured error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    AnimalCsv,
    MedicalCsv,
    MedicalProof,
    Photo,
}

/// One row- or item-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSample {
    pub file: ErrorSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    pub error: String,
}

impl ErrorSample {
    pub fn for_row(
        file: ErrorSource,
        row: u32,
        data: BTreeMap<String, String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            file,
            row: Some(row),
            filename: None,
            data: Some(data),
            error: error.into(),
        }
    }

    pub fn for_item(file: ErrorSource, filename: &str, error: impl Into<String>) -> Self {
        Self {
            file,
            row: None,
            filename: Some(filename.to_string()),
            data: None,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhaseStats {
    pub attempted: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// First failures in processing order, at most `sample_cap` of them.
    pub errors: Vec<ErrorSample>,
    /// Set when the roster circuit breaker rolled the phase back.
    pub aborted: bool,
    sample_cap: usize,
}

impl PhaseStats {
    pub fn new(sample_cap: usize) -> Self {
        Self {
            sample_cap,
            ..Self::default()
        }
    }

    /// Counts for tests and summaries built by hand.
    pub fn with_counts(attempted: u32, succeeded: u32, failed: u32) -> Self {
        Self {
            attempted,
            succeeded,
            failed,
            ..Self::default()
        }
    }

    pub fn success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn failure(&mut self, sample: ErrorSample) {
        self.attempted += 1;
        self.failed += 1;
        if self.errors.len() < self.sample_cap {
            self.errors.push(sample);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }

    /// Attempted, non-empty class where nothing succeeded.
    pub fn total_loss(&self) -> bool {
        self.attempted > 0 && self.succeeded == 0
    }

    /// Some, but not all, items succeeded.
    pub fn partial_loss(&self) -> bool {
        self.succeeded > 0 && self.succeeded < self.attempted
    }
}

/// Statistics of all four phases of one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportStats {
    pub animals: PhaseStats,
    pub medical_records: PhaseStats,
    pub medical_proofs: PhaseStats,
    pub photos: PhaseStats,
}

impl ImportStats {
    pub fn new(sample_cap: usize) -> Self {
        Self {
            animals: PhaseStats::new(sample_cap),
            medical_records: PhaseStats::new(sample_cap),
            medical_proofs: PhaseStats::new(sample_cap),
            photos: PhaseStats::new(sample_cap),
        }
    }

    /// Error samples in phase order, truncated to `limit`.
    pub fn error_samples(&self, limit: usize) -> Vec<ErrorSample> {
        [
            &self.animals,
            &self.medical_records,
            &self.medical_proofs,
            &self.photos,
        ]
        .into_iter()
        .flat_map(|phase| phase.errors.iter().cloned())
        .take(limit)
        .collect()
    }

    pub fn any_failures(&self) -> bool {
        self.animals.failed > 0
            || self.medical_records.failed > 0
            || self.medical_proofs.failed > 0
            || self.photos.failed > 0
    }
}
