//! Outcome classification.
//!
//! [`classify`] is a pure function of the four phases' statistics. Rules are
//! checked in order and the first match decides:
//!
//! 1. any roster row failed: `failed`
//! 2. photos or proofs were attempted and none succeeded: `partial_failed`
//! 3. photos or proofs partly succeeded: `partial_success`
//! 4. otherwise: `success`
//!
//! Photos are named before proofs wherever both apply.

use serde::{Deserialize, Serialize};

use crate::import::stats::{ErrorSample, ImportStats, PhaseStats};
use crate::job::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Success,
    PartialSuccess,
    PartialFailed,
    Failed,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::PartialSuccess => "partial_success",
            Category::PartialFailed => "partial_failed",
            Category::Failed => "failed",
        }
    }

    /// Terminal job status for this category.
    pub fn job_status(&self) -> JobStatus {
        match self {
            Category::Success | Category::PartialSuccess => JobStatus::Succeeded,
            Category::PartialFailed | Category::Failed => JobStatus::Failed,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
}

impl From<&PhaseStats> for ClassCounts {
    fn from(phase: &PhaseStats) -> Self {
        Self {
            total: phase.attempted,
            success: phase.succeeded,
            failed: phase.failed,
        }
    }
}

/// Result summary of a job whose pipeline ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub category: Category,
    pub message: String,
    pub has_errors: bool,
    pub animals: ClassCounts,
    pub medical_records: ClassCounts,
    pub medical_proofs: ClassCounts,
    pub photos: ClassCounts,
    pub error_samples: Vec<ErrorSample>,
}

impl ImportSummary {
    pub fn job_status(&self) -> JobStatus {
        self.category.job_status()
    }
}

/// Attachment classes in message order.
fn attachment_classes(stats: &ImportStats) -> [(&'static str, &PhaseStats); 2] {
    [
        ("photos", &stats.photos),
        ("medical proofs", &stats.medical_proofs),
    ]
}

pub fn classify(stats: &ImportStats, max_samples: usize) -> ImportSummary {
    let (category, message) = decide(stats);
    ImportSummary {
        category,
        message,
        has_errors: stats.any_failures(),
        animals: ClassCounts::from(&stats.animals),
        medical_records: ClassCounts::from(&stats.medical_records),
        medical_proofs: ClassCounts::from(&stats.medical_proofs),
        photos: ClassCounts::from(&stats.photos),
        error_samples: stats.error_samples(max_samples),
    }
}

fn decide(stats: &ImportStats) -> (Category, String) {
    let animals = &stats.animals;
    if animals.failed > 0 {
        let mut message = format!(
            "Animal import failed: {}/{} rows rejected",
            animals.failed, animals.attempted
        );
        if animals.aborted {
            message.push_str("; import aborted and no animals were kept");
        }
        return (Category::Failed, message);
    }

    let lost: Vec<&str> = attachment_classes(stats)
        .into_iter()
        .filter(|(_, phase)| phase.total_loss())
        .map(|(name, _)| name)
        .collect();
    if !lost.is_empty() {
        return (
            Category::PartialFailed,
            format!("Import of {} failed completely", lost.join(" and ")),
        );
    }

    let partial: Vec<String> = attachment_classes(stats)
        .into_iter()
        .filter(|(_, phase)| phase.partial_loss())
        .map(|(name, phase)| format!("{} {}/{}", name, phase.succeeded, phase.attempted))
        .collect();
    if !partial.is_empty() {
        return (
            Category::PartialSuccess,
            format!("Partial success: {} imported", partial.join(", ")),
        );
    }

    (
        Category::Success,
        "Import completed successfully".to_string(),
    )
}
