//! CSV reading shared by pre-flight validation and the importer.

use std::collections::BTreeMap;

pub const ROSTER_COLUMNS: &[&str] = &[
    "animal_code",
    "name",
    "species",
    "breed",
    "sex",
    "dob",
    "color",
    "description",
];

pub const MEDICAL_COLUMNS: &[&str] = &["animal_code", "record_type", "date"];

/// One data row keyed by normalized header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// 1-based position among data rows (the header is not counted).
    pub number: u32,
    pub fields: BTreeMap<String, String>,
}

impl TableRow {
    /// Trimmed cell value, `None` when the column is absent or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Required columns that are absent or blank in this row.
    pub fn missing(&self, columns: &[&str]) -> Vec<String> {
        columns
            .iter()
            .filter(|c| self.get(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }
}

/// A row that could not be decoded at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRow {
    pub number: u32,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Result<TableRow, UnreadableRow>>,
}

impl Table {
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|r| !self.headers.iter().any(|h| h == *r))
            .map(|r| r.to_string())
            .collect()
    }
}

fn reader(content: &str) -> csv::Reader<&[u8]> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes())
}

fn normalize_header(header: &str) -> String {
    header.trim().to_ascii_lowercase()
}

/// Parses a whole table. Only a broken header line is an error; a broken
/// data row is kept as an [`UnreadableRow`] in position.
pub fn parse(content: &str) -> Result<Table, csv::Error> {
    let mut reader = reader(content);
    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

    let rows = reader
        .records()
        .enumerate()
        .map(|(i, record)| {
            let number = i as u32 + 1;
            match record {
                Ok(record) => Ok(TableRow {
                    number,
                    fields: headers
                        .iter()
                        .cloned()
                        .zip(record.iter().map(str::to_string))
                        .collect(),
                }),
                Err(e) => Err(UnreadableRow {
                    number,
                    reason: e.to_string(),
                }),
            }
        })
        .collect();

    Ok(Table { headers, rows })
}
