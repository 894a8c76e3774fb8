use std::collections::BTreeMap;

use serde::Serialize;

use super::{Table, parse_applied_on};

/// Bucket used when a row's `source` column is blank.
pub const UNSPECIFIED_SOURCE: &str = "(unspecified)";

/// Distribution summaries the chart layer consumes.
///
/// All maps are `BTreeMap` so output order is deterministic.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSummary {
    pub total: usize,
    /// Rows whose `applied_on` parsed as a canonical date.
    pub dated: usize,
    pub undated: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub employment_type_counts: BTreeMap<String, usize>,
    pub sector_counts: BTreeMap<String, usize>,
    pub source_counts: BTreeMap<String, usize>,
    pub applications_by_day: Vec<DailyCount>,
}

/// Number of applications submitted on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

/// Aggregate a table into chart-ready counts. No IO.
pub fn summarize(table: &Table) -> TrackerSummary {
    let mut status_counts = BTreeMap::new();
    let mut employment_type_counts = BTreeMap::new();
    let mut sector_counts = BTreeMap::new();
    let mut source_counts = BTreeMap::new();
    let mut by_day: BTreeMap<String, usize> = BTreeMap::new();
    let mut dated = 0;

    for record in table.records() {
        bump(&mut status_counts, record.status.clone());
        bump(&mut employment_type_counts, record.employment_type.clone());
        bump(&mut sector_counts, record.sector.clone());
        let source = if record.source.trim().is_empty() {
            UNSPECIFIED_SOURCE.to_string()
        } else {
            record.source.clone()
        };
        bump(&mut source_counts, source);

        // Canonical dates sort chronologically as text, so the trimmed
        // original value doubles as the bucket key.
        if parse_applied_on(&record.applied_on).is_ok() {
            dated += 1;
            bump(&mut by_day, record.applied_on.trim().to_string());
        }
    }

    let applications_by_day = by_day
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect();

    TrackerSummary {
        total: table.len(),
        dated,
        undated: table.len() - dated,
        status_counts,
        employment_type_counts,
        sector_counts,
        source_counts,
        applications_by_day,
    }
}

fn bump(counts: &mut BTreeMap<String, usize>, key: String) {
    *counts.entry(key).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{ApplicationRecord, RecordId, Status};

    fn record(applied_on: &str, company: &str, source: &str, status: Status) -> ApplicationRecord {
        ApplicationRecord {
            id: RecordId::new(),
            applied_on: applied_on.into(),
            role: "Engineer".into(),
            company: company.into(),
            link: "https://example.com".into(),
            source: source.into(),
            contacts_added: String::new(),
            last_contact: String::new(),
            employment_type: "Full-time".into(),
            sector: "Tech".into(),
            status: status.to_string(),
        }
    }

    #[test]
    fn empty_table_yields_an_empty_summary() {
        let summary = summarize(&Table::new("ana"));
        assert_eq!(summary.total, 0);
        assert_eq!(summary.dated, 0);
        assert_eq!(summary.undated, 0);
        assert!(summary.status_counts.is_empty());
        assert!(summary.applications_by_day.is_empty());
    }

    #[test]
    fn counts_statuses_and_buckets_blank_sources() {
        let table = Table::from_records(
            "ana",
            vec![
                record("2024-03-01", "Acme", "LinkedIn", Status::Waiting),
                record("2024-03-02", "Globex", "", Status::Waiting),
                record("2024-03-02", "Initech", "Referral", Status::Hired),
            ],
        );
        let summary = summarize(&table);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.status_counts.get("Waiting"), Some(&2));
        assert_eq!(summary.status_counts.get("Hired"), Some(&1));
        assert_eq!(summary.source_counts.get(UNSPECIFIED_SOURCE), Some(&1));
        assert_eq!(summary.source_counts.get("LinkedIn"), Some(&1));
        assert_eq!(summary.employment_type_counts.get("Full-time"), Some(&3));
    }

    #[test]
    fn groups_parseable_dates_in_ascending_order() {
        let table = Table::from_records(
            "ana",
            vec![
                record("2024-03-05", "Acme", "", Status::Waiting),
                record("2024-02-28", "Globex", "", Status::Waiting),
                record("someday", "Initech", "", Status::Waiting),
                record("2024-03-05", "Hooli", "", Status::Waiting),
            ],
        );
        let summary = summarize(&table);
        assert_eq!(summary.dated, 3);
        assert_eq!(summary.undated, 1);
        assert_eq!(
            summary.applications_by_day,
            vec![
                DailyCount {
                    date: "2024-02-28".into(),
                    count: 1
                },
                DailyCount {
                    date: "2024-03-05".into(),
                    count: 2
                },
            ]
        );
    }
}
