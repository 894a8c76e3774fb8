//! Per-user job-application tables: records, the canonical storage schema and
//! the flat-file store that persists them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, format_description::FormatItem, macros::format_description};
use uuid::Uuid;

pub mod stats;
pub mod store;

pub use stats::{DailyCount, TrackerSummary, summarize};
pub use store::{StoreError, TrackerStore};

/// Canonical column header of a tracker file.
///
/// Must stay aligned with the field order of [`ApplicationRecord`]; the store
/// writes this header verbatim and reads columns back by name.
pub const CSV_HEADER: [&str; 11] = [
    "id",
    "applied_on",
    "role",
    "company",
    "link",
    "source",
    "contacts_added",
    "last_contact",
    "employment_type",
    "sector",
    "status",
];

/// Storage format for `applied_on` values.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parse an `applied_on` value in the canonical `YYYY-MM-DD` format.
///
/// Rows whose date fails to parse stay in the table; only date-based analysis
/// excludes them.
pub fn parse_applied_on(text: &str) -> Result<Date, time::error::Parse> {
    Date::parse(text.trim(), DATE_FORMAT)
}

/// Identifier for a tracked application row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create a new unique record identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Rehydrate a record identifier from a stored string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical progress vocabulary for an application.
///
/// The store does not enforce it; rows with historical labels still load and
/// feed the estimator as extra classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Waiting,
    Interview,
    Rejected,
    Hired,
}

impl Status {
    /// Every status in display order.
    pub fn all() -> [Status; 4] {
        [
            Status::Waiting,
            Status::Interview,
            Status::Rejected,
            Status::Hired,
        ]
    }

    /// The stored label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Waiting => "Waiting",
            Status::Interview => "Interview",
            Status::Rejected => "Rejected",
            Status::Hired => "Hired",
        }
    }

    /// The outcome the estimator treats as the favorable class.
    pub fn favorable() -> Status {
        Status::Hired
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a status label is outside the canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown application status: {0}")]
pub struct ParseStatusError(String);

impl std::str::FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Status::all()
            .into_iter()
            .find(|status| status.as_str() == text)
            .ok_or_else(|| ParseStatusError(text.to_string()))
    }
}

/// One job application row in canonical column order.
///
/// `applied_on` is kept as text so malformed values survive load; the optional
/// fields default to empty strings when a column is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    #[serde(default)]
    pub id: RecordId,
    pub applied_on: String,
    pub role: String,
    pub company: String,
    pub link: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub contacts_added: String,
    #[serde(default)]
    pub last_contact: String,
    pub employment_type: String,
    pub sector: String,
    pub status: String,
}

impl ApplicationRecord {
    /// Names of required fields that are still empty, in canonical order.
    ///
    /// `source`, `contacts_added` and `last_contact` are optional; everything
    /// else must be non-empty before an append is accepted.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("applied_on", &self.applied_on),
            ("role", &self.role),
            ("company", &self.company),
            ("link", &self.link),
            ("employment_type", &self.employment_type),
            ("sector", &self.sector),
            ("status", &self.status),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Ordered records for a single user, threaded explicitly through every
/// store and estimator call.
#[derive(Debug, Clone)]
pub struct Table {
    user_key: String,
    records: Vec<ApplicationRecord>,
}

impl Table {
    /// Create an empty table for `user_key`.
    pub fn new(user_key: impl Into<String>) -> Self {
        Self {
            user_key: user_key.into(),
            records: Vec::new(),
        }
    }

    /// Rebuild a table from stored rows, preserving their order.
    pub fn from_records(user_key: impl Into<String>, records: Vec<ApplicationRecord>) -> Self {
        Self {
            user_key: user_key.into(),
            records,
        }
    }

    /// The user key this table belongs to.
    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// The rows in storage order.
    pub fn records(&self) -> &[ApplicationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when a row with `id` already exists.
    pub fn contains_id(&self, id: &RecordId) -> bool {
        self.records.iter().any(|record| &record.id == id)
    }
}

/// Sanitize a user key into a filesystem-friendly file stem.
pub fn tracker_file_stem(user_key: &str) -> String {
    let mut cleaned: String = user_key
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*') {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        cleaned.push_str("tracker");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn file_stem_replaces_separator_characters() {
        assert_eq!(tracker_file_stem("ana/maria"), "ana_maria");
        assert_eq!(tracker_file_stem(r"c:\jobs*"), "c__jobs_");
        assert_eq!(tracker_file_stem("  ana  "), "ana");
    }

    #[test]
    fn empty_user_key_falls_back_to_a_stem() {
        assert_eq!(tracker_file_stem("   "), "tracker");
    }

    #[test]
    fn status_labels_round_trip() {
        for status in Status::all() {
            assert_eq!(Status::from_str(status.as_str()).unwrap(), status);
        }
        assert!(Status::from_str("Ghosted").is_err());
    }

    #[test]
    fn missing_fields_skips_optional_columns() {
        let record = ApplicationRecord {
            id: RecordId::new(),
            applied_on: "2024-01-05".into(),
            role: "Backend Engineer".into(),
            company: "Acme".into(),
            link: "https://example.com/jobs/1".into(),
            source: String::new(),
            contacts_added: String::new(),
            last_contact: String::new(),
            employment_type: "Full-time".into(),
            sector: "Tech".into(),
            status: Status::Waiting.to_string(),
        };
        assert!(record.missing_fields().is_empty());
    }

    #[test]
    fn missing_fields_lists_empty_required_columns_in_order() {
        let record = ApplicationRecord {
            id: RecordId::new(),
            applied_on: "2024-01-05".into(),
            role: String::new(),
            company: "Acme".into(),
            link: "  ".into(),
            source: String::new(),
            contacts_added: String::new(),
            last_contact: String::new(),
            employment_type: "Full-time".into(),
            sector: "Tech".into(),
            status: String::new(),
        };
        assert_eq!(record.missing_fields(), vec!["role", "link", "status"]);
    }

    #[test]
    fn applied_on_parses_canonical_dates_only() {
        assert!(parse_applied_on("2024-01-05").is_ok());
        assert!(parse_applied_on(" 2024-01-05 ").is_ok());
        assert!(parse_applied_on("05/01/2024").is_err());
        assert!(parse_applied_on("not a date").is_err());
    }
}
