//! Job-scoped index from external animal codes to internal animal ids.
//!
//! Operators pad numeric codes inconsistently across files ("001" in the
//! roster, "1" in a photo name), so numeric codes also match by value.
//! Lookup order is fixed: exact code, then the zero-stripped numeric form,
//! then the candidate re-padded to widths 2, 3 and 4. A lookup never picks
//! between two roster ids; it reports the code as ambiguous instead.
//! Non-numeric codes only match exactly.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

const PAD_WIDTHS: [usize; 3] = [2, 3, 4];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("animal code '{0}' not found in roster")]
    NotFound(String),

    #[error("animal code '{code}' matches more than one roster entry ({})", ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", "))]
    Ambiguous { code: String, ids: Vec<i64> },
}

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Numeric,
    Padded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMatch {
    pub id: i64,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NumericEntry {
    Unique(i64),
    Ambiguous(BTreeSet<i64>),
}

#[derive(Debug, Default, Clone)]
pub struct CorrelationIndex {
    exact: HashMap<String, i64>,
    numeric: HashMap<String, NumericEntry>,
}

impl CorrelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a roster code. Returns `false` (and changes nothing) when
    /// the exact code is already present.
    pub fn insert(&mut self, code: &str, id: i64) -> bool {
        let code = code.trim();
        if self.exact.contains_key(code) {
            return false;
        }
        self.exact.insert(code.to_string(), id);

        if let Some(normalized) = normalize_numeric(code) {
            let entry = match self.numeric.remove(&normalized) {
                None => NumericEntry::Unique(id),
                Some(NumericEntry::Unique(existing)) if existing == id => {
                    NumericEntry::Unique(existing)
                }
                Some(NumericEntry::Unique(existing)) => {
                    NumericEntry::Ambiguous([existing, id].into_iter().collect())
                }
                Some(NumericEntry::Ambiguous(mut ids)) => {
                    ids.insert(id);
                    NumericEntry::Ambiguous(ids)
                }
            };
            self.numeric.insert(normalized, entry);
        }
        true
    }

    pub fn contains_exact(&self, code: &str) -> bool {
        self.exact.contains_key(code.trim())
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn clear(&mut self) {
        self.exact.clear();
        self.numeric.clear();
    }

    /// Resolves a code from a medical row, proof or photo filename.
    pub fn resolve(&self, code: &str) -> Result<CodeMatch, CorrelationError> {
        let code = code.trim();

        if let Some(&id) = self.exact.get(code) {
            return Ok(CodeMatch {
                id,
                kind: MatchKind::Exact,
            });
        }

        let Some(normalized) = normalize_numeric(code) else {
            return Err(CorrelationError::NotFound(code.to_string()));
        };

        match self.numeric.get(&normalized) {
            Some(NumericEntry::Unique(id)) => {
                return Ok(CodeMatch {
                    id: *id,
                    kind: MatchKind::Numeric,
                })
            }
            Some(NumericEntry::Ambiguous(ids)) => {
                return Err(CorrelationError::Ambiguous {
                    code: code.to_string(),
                    ids: ids.iter().copied().collect(),
                })
            }
            None => {}
        }

        let padded: BTreeSet<i64> = PAD_WIDTHS
            .iter()
            .filter_map(|&width| self.exact.get(&format!("{:0>width$}", normalized)))
            .copied()
            .collect();

        match padded.len() {
            0 => Err(CorrelationError::NotFound(code.to_string())),
            1 => Ok(CodeMatch {
                id: padded.into_iter().next().unwrap_or_default(),
                kind: MatchKind::Padded,
            }),
            _ => Err(CorrelationError::Ambiguous {
                code: code.to_string(),
                ids: padded.into_iter().collect(),
            }),
        }
    }
}

/// Strips leading zeros from an all-digit code ("007" -> "7", "000" -> "0").
/// Returns `None` for anything that is not purely ASCII digits.
pub fn normalize_numeric(code: &str) -> Option<String> {
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let stripped = code.trim_start_matches('0');
    Some(if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    })
}
