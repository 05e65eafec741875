//! Object storage for staged proof documents and photos.

mod filesystem;
mod memory;

pub use filesystem::FileObjectStore;
pub use memory::MemoryObjectStore;

use crate::error::StorageError;

/// Metadata returned by [`ObjectStore::head`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// Blob storage addressed by namespaced keys such as
/// `batch-uploads/{shelter_id}/{uuid}.jpg`.
pub trait ObjectStore: Send + Sync {
    /// Stores a new object. Existing keys are never overwritten.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Returns object metadata, `StorageError::NotFound` if absent.
    fn head(&self, key: &str) -> Result<ObjectMeta, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Public reference recorded alongside the key.
    fn public_url(&self, key: &str) -> String;
}

/// Rejects keys that could escape the store namespace.
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Staging key for a proof document.
pub fn proof_key(shelter_id: i64, extension: &str) -> String {
    format!(
        "medical-proofs/{}/{}.{}",
        shelter_id,
        uuid::Uuid::new_v4(),
        extension.to_ascii_lowercase()
    )
}

/// Staging key for a photo.
pub fn photo_key(shelter_id: i64, extension: &str) -> String {
    format!(
        "batch-uploads/{}/{}.{}",
        shelter_id,
        uuid::Uuid::new_v4(),
        extension.to_ascii_lowercase()
    )
}

/// Key of a finished export. Scoped by job so retries of one job write the
/// same key.
pub fn export_key(shelter_id: i64, job_id: &str, filename: &str) -> String {
    format!("exports/{}/{}/{}", shelter_id, job_id, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key("batch-uploads/1/a.jpg").is_ok());
        assert!(check_key("").is_err());
        assert!(check_key("/etc/passwd").is_err());
        assert!(check_key("a/../b").is_err());
        assert!(check_key("a//b").is_err());
    }

    #[test]
    fn test_keys_are_namespaced_and_unique() {
        let a = photo_key(4, "JPG");
        let b = photo_key(4, "jpg");
        assert!(a.starts_with("batch-uploads/4/"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
        assert!(proof_key(4, "pdf").starts_with("medical-proofs/4/"));
        let export = export_key(4, "job-1", "animals-export-4-20260101000000.csv");
        assert_eq!(export, "exports/4/job-1/animals-export-4-20260101000000.csv");
        assert!(check_key(&export).is_ok());
    }
}
