//! Feature encoding for the outcome estimator.
//!
//! Rows become one date-ordinal column plus drop-first one-hot columns for
//! the categorical fields, standardized to zero mean and unit variance. The
//! schema is an explicit artifact so prediction encodes candidates exactly
//! the way training encoded rows.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;
use tracing::warn;

use crate::tracker::{ApplicationRecord, Status, parse_applied_on};

/// Version stamp carried by every schema this module produces.
pub const FEATURE_SCHEMA_VERSION: i64 = 1;

/// Errors that may occur while encoding records into features.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("No rows with a parseable applied_on date ({dropped} dropped)")]
    NoUsableRows { dropped: usize },
    #[error("Encoded features contain non-finite values")]
    NonFinite,
    #[error("Failed to shape the feature matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Categorical record fields the estimator one-hot encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoricalField {
    EmploymentType,
    Sector,
}

impl CategoricalField {
    fn value_of<'a>(self, record: &'a ApplicationRecord) -> &'a str {
        match self {
            CategoricalField::EmploymentType => &record.employment_type,
            CategoricalField::Sector => &record.sector,
        }
    }
}

/// One column of the encoded feature matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureColumn {
    /// Julian day number of `applied_on`.
    AppliedOrdinal,
    /// One-hot indicator for `field == value`.
    Category {
        field: CategoricalField,
        value: String,
    },
}

/// Column layout and class vocabulary observed at fit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub schema_version: i64,
    pub columns: Vec<FeatureColumn>,
    /// Sorted distinct status labels; `y` indexes into this list.
    pub classes: Vec<String>,
}

impl FeatureSchema {
    /// Build the schema from the usable rows.
    ///
    /// The first category of each field (in sorted order) is dropped; an
    /// all-zeros one-hot block is that baseline category.
    fn from_observed(records: &[&ApplicationRecord]) -> Self {
        let mut columns = vec![FeatureColumn::AppliedOrdinal];
        for field in [CategoricalField::EmploymentType, CategoricalField::Sector] {
            let values: BTreeSet<&str> =
                records.iter().map(|record| field.value_of(record)).collect();
            columns.extend(values.into_iter().skip(1).map(|value| {
                FeatureColumn::Category {
                    field,
                    value: value.to_string(),
                }
            }));
        }
        let classes: BTreeSet<&str> =
            records.iter().map(|record| record.status.as_str()).collect();
        Self {
            schema_version: FEATURE_SCHEMA_VERSION,
            columns,
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Index of `status` among the observed classes.
    pub fn class_index(&self, status: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == status)
    }

    /// Index of the favorable outcome, when it was observed at fit time.
    pub fn favorable_class(&self) -> Option<usize> {
        self.class_index(Status::favorable().as_str())
    }

    /// Encode a stored row whose `applied_on` already parsed.
    pub fn encode_record(&self, applied_on: Date, record: &ApplicationRecord) -> Vec<f64> {
        self.encode(applied_on, &record.employment_type, &record.sector)
    }

    /// Encode a hypothetical application.
    ///
    /// Category values never seen at fit time match no column and leave the
    /// one-hot block at the baseline; this is never an error.
    pub fn encode_candidate(&self, candidate: &CandidateApplication) -> Vec<f64> {
        self.encode(
            candidate.applied_on,
            &candidate.employment_type,
            &candidate.sector,
        )
    }

    fn encode(&self, applied_on: Date, employment_type: &str, sector: &str) -> Vec<f64> {
        self.columns
            .iter()
            .map(|column| match column {
                FeatureColumn::AppliedOrdinal => f64::from(applied_on.to_julian_day()),
                FeatureColumn::Category { field, value } => {
                    let observed = match field {
                        CategoricalField::EmploymentType => employment_type,
                        CategoricalField::Sector => sector,
                    };
                    if observed == value { 1.0 } else { 0.0 }
                }
            })
            .collect()
    }
}

/// The hypothetical application scored by the estimator.
#[derive(Debug, Clone)]
pub struct CandidateApplication {
    pub applied_on: Date,
    pub employment_type: String,
    pub sector: String,
}

/// Per-column standardization fitted on the training matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and population standard deviation.
    ///
    /// Constant columns get a scale of 1.0 so they standardize to zero
    /// instead of dividing by zero.
    fn fit(x: &Array2<f64>) -> Self {
        let rows = x.nrows().max(1) as f64;
        let mut means = Vec::with_capacity(x.ncols());
        let mut stds = Vec::with_capacity(x.ncols());
        for column in x.columns() {
            let mean = column.sum() / rows;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / rows;
            let std = variance.sqrt();
            means.push(mean);
            stds.push(if std > 0.0 { std } else { 1.0 });
        }
        Self { means, stds }
    }

    /// Standardize a feature matrix in place.
    fn transform(&self, x: &mut Array2<f64>) {
        for (mut column, (mean, std)) in x
            .columns_mut()
            .into_iter()
            .zip(self.means.iter().zip(&self.stds))
        {
            for value in column.iter_mut() {
                *value = (*value - mean) / std;
            }
        }
    }

    /// Standardize one encoded row.
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(value, (mean, std))| (value - mean) / std)
            .collect()
    }
}

/// Everything training needs, derived in one pass over the records.
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    /// Standardized feature matrix, one row per usable record.
    pub x: Array2<f64>,
    /// Class index per row, aligned with `schema.classes`.
    pub y: Array1<usize>,
    pub schema: FeatureSchema,
    pub scaler: StandardScaler,
    /// Rows dropped because `applied_on` failed to parse.
    pub dropped_rows: usize,
}

/// Encode and standardize the records with a parseable `applied_on`.
pub fn prepare_features(records: &[ApplicationRecord]) -> Result<PreparedFeatures, FeatureError> {
    let mut usable: Vec<(Date, &ApplicationRecord)> = Vec::with_capacity(records.len());
    let mut dropped_rows = 0usize;
    for record in records {
        match parse_applied_on(&record.applied_on) {
            Ok(date) => usable.push((date, record)),
            Err(_) => dropped_rows += 1,
        }
    }
    if usable.is_empty() {
        return Err(FeatureError::NoUsableRows {
            dropped: dropped_rows,
        });
    }
    if dropped_rows > 0 {
        warn!("dropped {dropped_rows} rows with unparseable applied_on dates");
    }

    let row_refs: Vec<&ApplicationRecord> = usable.iter().map(|(_, record)| *record).collect();
    let schema = FeatureSchema::from_observed(&row_refs);

    let mut data = Vec::with_capacity(usable.len() * schema.width());
    let mut labels = Vec::with_capacity(usable.len());
    for (date, record) in &usable {
        let Some(class) = schema.class_index(&record.status) else {
            continue;
        };
        labels.push(class);
        data.extend(schema.encode_record(*date, record));
    }
    let mut x = Array2::from_shape_vec((labels.len(), schema.width()), data)?;
    if x.iter().any(|value| !value.is_finite()) {
        return Err(FeatureError::NonFinite);
    }
    let scaler = StandardScaler::fit(&x);
    scaler.transform(&mut x);

    Ok(PreparedFeatures {
        x,
        y: Array1::from(labels),
        schema,
        scaler,
        dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::RecordId;
    use time::macros::date;

    fn record(
        applied_on: &str,
        employment_type: &str,
        sector: &str,
        status: Status,
    ) -> ApplicationRecord {
        ApplicationRecord {
            id: RecordId::new(),
            applied_on: applied_on.into(),
            role: "Engineer".into(),
            company: "Acme".into(),
            link: "https://example.com".into(),
            source: String::new(),
            contacts_added: String::new(),
            last_contact: String::new(),
            employment_type: employment_type.into(),
            sector: sector.into(),
            status: status.to_string(),
        }
    }

    #[test]
    fn schema_drops_the_first_category_per_field() {
        let rows = vec![
            record("2024-01-02", "Full-time", "Tech", Status::Waiting),
            record("2024-01-03", "Internship", "Fintech", Status::Hired),
        ];
        let prepared = prepare_features(&rows).unwrap();
        assert_eq!(
            prepared.schema.columns,
            vec![
                FeatureColumn::AppliedOrdinal,
                FeatureColumn::Category {
                    field: CategoricalField::EmploymentType,
                    value: "Internship".into(),
                },
                FeatureColumn::Category {
                    field: CategoricalField::Sector,
                    value: "Tech".into(),
                },
            ]
        );
        assert_eq!(prepared.schema.width(), 3);
    }

    #[test]
    fn classes_are_sorted_and_deduplicated() {
        let rows = vec![
            record("2024-01-02", "Full-time", "Tech", Status::Waiting),
            record("2024-01-03", "Full-time", "Tech", Status::Hired),
            record("2024-01-04", "Full-time", "Tech", Status::Waiting),
        ];
        let prepared = prepare_features(&rows).unwrap();
        assert_eq!(prepared.schema.classes, vec!["Hired", "Waiting"]);
        assert_eq!(prepared.schema.favorable_class(), Some(0));
        assert_eq!(prepared.y.to_vec(), vec![1, 0, 1]);
    }

    #[test]
    fn unparseable_dates_are_dropped_and_counted() {
        let rows = vec![
            record("2024-01-02", "Full-time", "Tech", Status::Waiting),
            record("someday", "Full-time", "Tech", Status::Hired),
            record("2024-01-04", "Full-time", "Tech", Status::Hired),
        ];
        let prepared = prepare_features(&rows).unwrap();
        assert_eq!(prepared.x.nrows(), 2);
        assert_eq!(prepared.dropped_rows, 1);
    }

    #[test]
    fn fails_when_no_dates_parse() {
        let rows = vec![
            record("sometime", "Full-time", "Tech", Status::Waiting),
            record("later", "Full-time", "Tech", Status::Hired),
        ];
        let err = prepare_features(&rows).unwrap_err();
        assert!(matches!(err, FeatureError::NoUsableRows { dropped: 2 }));
    }

    #[test]
    fn candidate_with_unseen_categories_encodes_to_the_baseline() {
        let rows = vec![
            record("2024-01-02", "Full-time", "Tech", Status::Waiting),
            record("2024-01-03", "Internship", "Fintech", Status::Hired),
        ];
        let prepared = prepare_features(&rows).unwrap();
        let candidate = CandidateApplication {
            applied_on: date!(2024 - 01 - 05),
            employment_type: "Contract".into(),
            sector: "Space".into(),
        };
        let encoded = prepared.schema.encode_candidate(&candidate);
        assert_eq!(encoded.len(), prepared.schema.width());
        assert_eq!(
            encoded[0],
            f64::from(date!(2024 - 01 - 05).to_julian_day())
        );
        assert!(encoded[1..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn standardized_columns_are_centered() {
        let rows = vec![
            record("2024-01-02", "Full-time", "Tech", Status::Waiting),
            record("2024-01-06", "Internship", "Tech", Status::Hired),
            record("2024-01-10", "Full-time", "Tech", Status::Rejected),
        ];
        let prepared = prepare_features(&rows).unwrap();
        for column in prepared.x.columns() {
            let mean: f64 = column.sum() / column.len() as f64;
            assert!(mean.abs() < 1e-9, "column mean {mean} not centered");
        }
    }

    #[test]
    fn scaler_transform_row_matches_matrix_transform() {
        let rows = vec![
            record("2024-01-02", "Full-time", "Tech", Status::Waiting),
            record("2024-01-06", "Internship", "Fintech", Status::Hired),
            record("2024-01-10", "Full-time", "Tech", Status::Rejected),
        ];
        let prepared = prepare_features(&rows).unwrap();
        let raw = prepared.schema.encode_record(
            date!(2024 - 01 - 02),
            &record("2024-01-02", "Full-time", "Tech", Status::Waiting),
        );
        let scaled = prepared.scaler.transform_row(&raw);
        let first_row: Vec<f64> = prepared.x.row(0).to_vec();
        for (a, b) in scaled.iter().zip(&first_row) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
