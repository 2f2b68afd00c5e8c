//! Land-register retrieval protocol.
//!
//! One [`RegisterScraper`] drives a [`BrowserSession`](crate::session::BrowserSession)
//! through the fixed EKW search flow and extracts the record's data; the
//! persistence step turns the extracted record into one artifact per enabled
//! format.

pub mod register_scraper;

use std::collections::BTreeMap;

use serde::Serialize;

pub use register_scraper::RegisterScraper;

/// Sections of a land register that can be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegisterSection {
    /// Dział I-O, property designation
    IO,
    /// Dział I-Sp, rights attached to ownership
    ISp,
    /// Dział II, ownership
    II,
    /// Dział III, claims and encumbrances
    III,
    /// Dział IV, mortgages
    IV,
}

impl RegisterSection {
    /// Parses a config-file section name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "I-O" | "IO" => Some(Self::IO),
            "I-SP" | "ISP" => Some(Self::ISp),
            "II" => Some(Self::II),
            "III" => Some(Self::III),
            "IV" => Some(Self::IV),
            _ => None,
        }
    }

    /// Label of the section button on the register page.
    pub fn label(&self) -> &'static str {
        match self {
            Self::IO => "Dział I-O",
            Self::ISp => "Dział I-Sp",
            Self::II => "Dział II",
            Self::III => "Dział III",
            Self::IV => "Dział IV",
        }
    }
}

/// Structured data extracted from one land register.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterData {
    /// Canonical KW number the data belongs to
    pub kw_number: String,
    /// Labeled header fields of the register
    pub basic_info: BTreeMap<String, String>,
    /// Owner rows beyond the fixed header fields
    pub owners: Vec<String>,
    /// Raw cell texts per extracted section, keyed by section label
    pub sections: BTreeMap<String, Vec<String>>,
}

impl RegisterData {
    /// Flattens the record into a two-row CSV: header line, value line.
    pub fn to_csv(&self) -> String {
        let mut headers = vec!["kw_number".to_string()];
        let mut values = vec![csv_escape(&self.kw_number)];
        for (key, value) in &self.basic_info {
            headers.push(csv_escape(key));
            values.push(csv_escape(value));
        }
        headers.push("owners".to_string());
        values.push(csv_escape(&self.owners.join("; ")));
        format!("{}\n{}\n", headers.join(","), values.join(","))
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
