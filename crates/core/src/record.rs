use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::field::FieldKind;

/// Raw recognized text per field for one source image. Lives for a single
/// pipeline pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub filename: String,
    pub fields: BTreeMap<FieldKind, String>,
}

impl ExtractedRecord {
    pub fn new(filename: impl Into<String>) -> Self {
        Self { filename: filename.into(), fields: BTreeMap::new() }
    }

    /// Recognized text for `kind`; empty when the region produced nothing.
    pub fn text(&self, kind: FieldKind) -> &str {
        self.fields.get(&kind).map(String::as_str).unwrap_or("")
    }
}

/// Field values after the field-specific correction routines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub filename: String,
    pub beneficiary_name: String,
    pub record_number: String,
    /// `DD/MM/YYYY`, or the recognized text unchanged when it could not be read as a date.
    pub date: String,
    /// Whether `date` holds a canonical `DD/MM/YYYY` value.
    pub date_canonical: bool,
    /// Digits only. May still be shorter than a full phone number.
    pub mobile: String,
}

/// One line of the record store, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    #[serde(rename = "Sr.No.")]
    pub sr_no: u64,
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Name of beneficiary")]
    pub beneficiary_name: String,
    #[serde(rename = "Record No.")]
    pub record_number: String,
    #[serde(rename = "Date of document")]
    pub date: String,
    #[serde(rename = "Mobile")]
    pub mobile: String,
}

impl StoredRow {
    pub const HEADER: [&'static str; 6] = [
        "Sr.No.",
        "Filename",
        "Name of beneficiary",
        "Record No.",
        "Date of document",
        "Mobile",
    ];

    pub fn from_record(sr_no: u64, record: &NormalizedRecord) -> Self {
        StoredRow {
            sr_no,
            filename: record.filename.clone(),
            beneficiary_name: record.beneficiary_name.clone(),
            record_number: record.record_number.clone(),
            date: record.date.clone(),
            mobile: record.mobile.clone(),
        }
    }
}
