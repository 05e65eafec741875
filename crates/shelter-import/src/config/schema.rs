use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub version: String,
    /// Defaults to `~/.shelter-import/data/import.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    pub storage: StorageConfig,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_base_url: String,
}

/// Size ceilings and sampling caps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_table_bytes")]
    pub max_table_bytes: u64,
    #[serde(default = "default_proof_bytes")]
    pub max_proof_bytes: u64,
    #[serde(default = "default_photo_bytes")]
    pub max_photo_bytes: u64,
    /// Roster rows allowed to fail before the whole job is aborted.
    #[serde(default = "default_max_failed_rows")]
    pub max_failed_rows: u32,
    #[serde(default = "default_max_error_samples")]
    pub max_error_samples: usize,
    #[serde(default = "default_max_prevalidation_samples")]
    pub max_prevalidation_samples: usize,
}

const MIB: u64 = 1024 * 1024;

fn default_table_bytes() -> u64 {
    10 * MIB
}

fn default_proof_bytes() -> u64 {
    10 * MIB
}

fn default_photo_bytes() -> u64 {
    5 * MIB
}

fn default_max_failed_rows() -> u32 {
    100
}

fn default_max_error_samples() -> usize {
    20
}

fn default_max_prevalidation_samples() -> usize {
    10
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_table_bytes: default_table_bytes(),
            max_proof_bytes: default_proof_bytes(),
            max_photo_bytes: default_photo_bytes(),
            max_failed_rows: default_max_failed_rows(),
            max_error_samples: default_max_error_samples(),
            max_prevalidation_samples: default_max_prevalidation_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial attempt plus retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}
