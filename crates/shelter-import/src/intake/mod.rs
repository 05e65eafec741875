//! Submission boundary: typed upload payloads, pre-flight validation and
//! job creation.

pub mod filename;
pub mod service;
pub mod validator;

pub use service::{IntakeService, JobTicket};
pub use validator::{validate, CheckedAttachment, ValidatedSubmission};

/// One uploaded file as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    /// Declared content type; guessed from the filename when absent.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Declared content type, lower-cased and without parameters, or the
    /// type guessed from the extension.
    pub fn effective_content_type(&self) -> String {
        match self.content_type.as_deref() {
            Some(declared) if !declared.trim().is_empty() => declared
                .split(';')
                .next()
                .unwrap_or(declared)
                .trim()
                .to_ascii_lowercase(),
            _ => mime_guess::from_path(&self.filename)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        }
    }
}

/// A batch import request for one shelter.
#[derive(Debug, Clone)]
pub struct Submission {
    pub shelter_id: i64,
    pub created_by: i64,
    pub roster: Option<UploadedFile>,
    pub medical: Option<UploadedFile>,
    pub proofs: Vec<UploadedFile>,
    pub photos: Vec<UploadedFile>,
}

impl Submission {
    pub fn new(shelter_id: i64, created_by: i64, roster: UploadedFile) -> Self {
        Self {
            shelter_id,
            created_by,
            roster: Some(roster),
            medical: None,
            proofs: Vec::new(),
            photos: Vec::new(),
        }
    }

    pub fn with_medical(mut self, medical: UploadedFile) -> Self {
        self.medical = Some(medical);
        self
    }

    pub fn with_proof(mut self, proof: UploadedFile) -> Self {
        self.proofs.push(proof);
        self
    }

    pub fn with_photo(mut self, photo: UploadedFile) -> Self {
        self.photos.push(photo);
        self
    }
}
