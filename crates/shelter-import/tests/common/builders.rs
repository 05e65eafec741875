//! Builders for submission payloads.

#![allow(dead_code)]

use shelter_import::UploadedFile;

const ROSTER_HEADER: &str = "animal_code,name,species,breed,sex,dob,color,description";
const MEDICAL_HEADER: &str = "animal_code,record_type,date,record_sequence,provider,details";

/// Builder for the animal roster CSV.
pub struct RosterBuilder {
    rows: Vec<String>,
}

impl RosterBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Adds a fully valid row.
    pub fn animal(mut self, code: &str, name: &str) -> Self {
        self.rows.push(format!(
            "{},{},CAT,Mixed,FEMALE,2021-03-14,Grey,Calm lap cat",
            code, name
        ));
        self
    }

    /// Adds `count` valid rows coded `A001`, `A002`, ...
    pub fn animals(mut self, count: usize) -> Self {
        for n in 1..=count {
            self = self.animal(&format!("A{:03}", n), &format!("Animal {}", n));
        }
        self
    }

    /// Adds a row verbatim.
    pub fn raw(mut self, row: &str) -> Self {
        self.rows.push(row.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut content = String::from(ROSTER_HEADER);
        for row in &self.rows {
            content.push('\n');
            content.push_str(row);
        }
        content.push('\n');
        content
    }

    pub fn upload(&self) -> UploadedFile {
        UploadedFile::new("animals.csv", self.build()).with_content_type("text/csv")
    }
}

impl Default for RosterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the medical history CSV.
pub struct MedicalBuilder {
    rows: Vec<String>,
}

impl MedicalBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn record(mut self, code: &str, record_type: &str, date: &str, sequence: u32) -> Self {
        self.rows.push(format!(
            "{},{},{},{},City Vet,routine",
            code, record_type, date, sequence
        ));
        self
    }

    pub fn build(&self) -> String {
        let mut content = String::from(MEDICAL_HEADER);
        for row in &self.rows {
            content.push('\n');
            content.push_str(row);
        }
        content.push('\n');
        content
    }

    pub fn upload(&self) -> UploadedFile {
        UploadedFile::new("medical.csv", self.build()).with_content_type("text/csv")
    }
}

impl Default for MedicalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A small JPEG upload named `{code}_{sequence}.jpg`.
pub fn photo(filename: &str) -> UploadedFile {
    UploadedFile::new(filename, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).with_content_type("image/jpeg")
}

/// A small PDF upload.
pub fn proof(filename: &str) -> UploadedFile {
    UploadedFile::new(filename, b"%PDF-1.4\n%%EOF\n".to_vec()).with_content_type("application/pdf")
}
