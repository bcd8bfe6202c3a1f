//! # Index Reconciliation
//!
//! The index is a JSON array stored at [`crate::INDEX_PATH`], holding one
//! record per label (compared case-insensitively). Reconciliation is a
//! pure transformation: decode the fetched bytes, build the replacement
//! sequence with [`upsert_record`], and encode it with [`encode_index`].
//! Fetching and conditionally committing the bytes is the orchestrator's
//! job.
//!
//! ## Wire shape
//!
//! ```json
//! [
//!   {
//!     "nama_pahlawan": "Pahlawan A",
//!     "image_url": "https://raw.githubusercontent.com/o/r/main/images/pahlawan-a-1700000000123.png",
//!     "uploaded_at": "2026-10-19T08:00:00.123Z"
//!   }
//! ]
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON key holding the label.
const LABEL_FIELD: &str = "nama_pahlawan";

/// One label → image mapping.
///
/// Unknown fields are kept in `extra` so a rewrite does not lose data
/// added by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// The label, matched case-insensitively.
    #[serde(rename = "nama_pahlawan")]
    pub label: String,
    /// Public URL of the most recent image for this label.
    #[serde(default)]
    pub image_url: String,
    /// RFC 3339 upload time of that image.
    #[serde(default)]
    pub uploaded_at: String,
    /// Fields this service does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexRecord {
    /// Create a fresh record stamped with `uploaded_at`.
    pub fn new(label: impl Into<String>, image_url: impl Into<String>, uploaded_at: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            image_url: image_url.into(),
            uploaded_at: uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            extra: Map::new(),
        }
    }

    /// Whether this record is keyed by `label`, ignoring case.
    pub fn matches_label(&self, label: &str) -> bool {
        same_label(&self.label, label)
    }
}

fn same_label(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// An element of the index array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexEntry {
    /// A recognised record.
    Record(IndexRecord),
    /// Anything else found in the array, carried through untouched.
    Other(Value),
}

impl IndexEntry {
    /// The entry's label: a record's, or the string `nama_pahlawan` of an
    /// object whose other fields do not fit [`IndexRecord`].
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Record(record) => Some(&record.label),
            Self::Other(value) => value.get(LABEL_FIELD).and_then(Value::as_str),
        }
    }

    /// Whether this entry is keyed by `label`, ignoring case.
    pub fn matches_label(&self, label: &str) -> bool {
        self.label().is_some_and(|own| same_label(own, label))
    }

    fn from_value(value: Value) -> Self {
        match serde_json::from_value::<IndexRecord>(value.clone()) {
            Ok(record) => Self::Record(record),
            Err(_) => Self::Other(value),
        }
    }
}

/// Decode fetched index bytes.
///
/// A well-formed document that is not an array decodes to an empty
/// sequence.
///
/// # Errors
///
/// Returns the underlying `serde_json` error when the bytes are not
/// UTF-8 JSON at all.
pub fn decode_index(bytes: &[u8]) -> Result<Vec<IndexEntry>, serde_json::Error> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(items) => Ok(items.into_iter().map(IndexEntry::from_value).collect()),
        _ => Ok(Vec::new()),
    }
}

/// Encode the index as pretty-printed JSON with a trailing newline.
///
/// # Errors
///
/// Propagates `serde_json` serialization failures.
pub fn encode_index(entries: &[IndexEntry]) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(entries)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Replace the first entry labelled `record.label` (case-insensitively)
/// in place, or append `record` when there is none.
///
/// Labelled objects with malformed fields count as matches, so a bad
/// `image_url` or `uploaded_at` is repaired rather than duplicated.
pub fn upsert_record(entries: Vec<IndexEntry>, record: IndexRecord) -> Vec<IndexEntry> {
    let mut replaced = false;
    let mut updated: Vec<IndexEntry> = entries
        .into_iter()
        .map(|entry| {
            let is_match = entry.matches_label(&record.label);
            if !replaced && is_match {
                replaced = true;
                IndexEntry::Record(record.clone())
            } else {
                entry
            }
        })
        .collect();

    if !replaced {
        updated.push(IndexEntry::Record(record));
    }
    updated
}
