//! `{animal_code}_{sequence}.{ext}` filename grammar for proofs and photos.

use std::sync::LazyLock;

use regex::Regex;

/// Code and sequence embedded in an attachment filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentName {
    pub animal_code: String,
    pub sequence: u32,
    pub extension: String,
}

static RE_PROOF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)_(\d+)\.(pdf|doc|docx|jpg|jpeg|png)$").unwrap());
static RE_PHOTO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)_(\d+)\.([A-Za-z]+)$").unwrap());

/// Parses a proof document name; the extension must be a document or image type.
pub fn parse_proof_name(filename: &str) -> Option<AttachmentName> {
    parse_with(&RE_PROOF, filename)
}

/// Parses a photo name; any alphabetic extension is accepted here, the
/// content type is checked separately.
pub fn parse_photo_name(filename: &str) -> Option<AttachmentName> {
    parse_with(&RE_PHOTO, filename)
}

fn parse_with(pattern: &Regex, filename: &str) -> Option<AttachmentName> {
    let caps = pattern.captures(filename)?;
    let animal_code = caps.get(1)?.as_str().trim();
    if animal_code.is_empty() {
        return None;
    }
    // Sequences too large for u32 fail the grammar.
    let sequence = caps.get(2)?.as_str().parse::<u32>().ok()?;
    Some(AttachmentName {
        animal_code: animal_code.to_string(),
        sequence,
        extension: caps.get(3)?.as_str().to_ascii_lowercase(),
    })
}
