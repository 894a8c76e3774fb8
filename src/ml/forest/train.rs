use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use crate::ml::features::{FeatureError, PreparedFeatures, prepare_features};
use crate::ml::metrics::{ConfusionMatrix, accuracy};
use crate::tracker::ApplicationRecord;

use super::model::OutcomeForest;

/// Training hyperparameters for the outcome forest.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Number of bagged trees.
    pub trees: usize,
    /// Seed shared by the shuffle, bootstrap resamples and fold assignment.
    pub seed: u64,
    /// Fraction of usable rows held out for evaluation.
    pub holdout: f64,
    /// Number of cross-validation folds.
    pub folds: usize,
    /// Minimum usable rows before training is attempted.
    pub min_rows: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            trees: 100,
            seed: 42,
            holdout: 0.2,
            folds: 5,
            min_rows: 8,
        }
    }
}

/// Evaluation summary returned alongside the fitted forest.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Mean accuracy over the cross-validation folds.
    pub cv_accuracy: f32,
    /// Accuracy on the seeded holdout split.
    pub holdout_accuracy: f32,
    /// Rows that survived date parsing and fed the estimator.
    pub rows_used: usize,
    /// Rows dropped for an unparseable `applied_on`.
    pub rows_dropped: usize,
    /// Class labels, aligned with confusion-matrix indices.
    pub classes: Vec<String>,
    /// Confusion matrix over the holdout split.
    pub confusion: ConfusionMatrix,
}

/// Errors that may occur while training the outcome forest.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error("Need at least 2 distinct status labels, found {classes}")]
    NotEnoughClasses { classes: usize },
    #[error("Need at least {min} usable rows, found {rows}")]
    NotEnoughRows { rows: usize, min: usize },
    #[error("Tree fit failed: {0}")]
    Fit(#[from] linfa::error::Error),
}

/// Train the bagged forest over a user's records and evaluate it.
///
/// The class check runs before the row check so a small single-status table
/// reports the class problem. Identical records and options produce
/// identical forests and reports.
pub fn train_outcome_forest(
    records: &[ApplicationRecord],
    options: &TrainOptions,
) -> Result<(OutcomeForest, TrainReport), TrainError> {
    let prepared = prepare_features(records)?;
    let n_classes = prepared.schema.classes.len();
    if n_classes < 2 {
        return Err(TrainError::NotEnoughClasses { classes: n_classes });
    }
    let rows = prepared.x.nrows();
    if rows < options.min_rows {
        return Err(TrainError::NotEnoughRows {
            rows,
            min: options.min_rows,
        });
    }
    let trees = options.trees.max(1);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut indices: Vec<usize> = (0..rows).collect();
    indices.shuffle(&mut rng);
    // Two distinct classes imply at least two rows, so both splits stay
    // non-empty.
    let holdout_len = holdout_len(rows, options.holdout);
    let (holdout_idx, train_idx) = indices.split_at(holdout_len);

    let fitted = fit_bagged_trees(&prepared.x, &prepared.y, train_idx, trees, &mut rng)?;
    let forest = OutcomeForest {
        trees: fitted,
        schema: prepared.schema.clone(),
        scaler: prepared.scaler.clone(),
    };

    let mut confusion = ConfusionMatrix::new(n_classes);
    for &idx in holdout_idx {
        let row: Vec<f64> = prepared.x.row(idx).to_vec();
        confusion.add(prepared.y[idx], forest.predict_class_index(&row));
    }
    let holdout_accuracy = accuracy(&confusion);
    let cv_accuracy = cross_validate(&prepared, options, n_classes)?;

    info!(
        "trained {trees} trees on {rows} rows (holdout accuracy {holdout_accuracy:.3}, cv accuracy {cv_accuracy:.3})"
    );

    let report = TrainReport {
        cv_accuracy,
        holdout_accuracy,
        rows_used: rows,
        rows_dropped: prepared.dropped_rows,
        classes: prepared.schema.classes.clone(),
        confusion,
    };
    Ok((forest, report))
}

fn holdout_len(rows: usize, fraction: f64) -> usize {
    let raw = (rows as f64 * fraction).round() as usize;
    raw.max(1).min(rows - 1)
}

fn fit_bagged_trees(
    x: &Array2<f64>,
    y: &Array1<usize>,
    train_idx: &[usize],
    trees: usize,
    rng: &mut StdRng,
) -> Result<Vec<DecisionTree<f64, usize>>, linfa::error::Error> {
    let mut fitted = Vec::with_capacity(trees);
    for _ in 0..trees {
        let sample: Vec<usize> = (0..train_idx.len())
            .map(|_| train_idx[rng.random_range(0..train_idx.len())])
            .collect();
        let sample_x = x.select(Axis(0), &sample);
        let sample_y = y.select(Axis(0), &sample);
        let dataset = Dataset::new(sample_x, sample_y);
        fitted.push(DecisionTree::params().fit(&dataset)?);
    }
    Ok(fitted)
}

/// Mean accuracy over seeded shuffled folds, each scored by a fresh forest
/// fitted on its complement.
fn cross_validate(
    prepared: &PreparedFeatures,
    options: &TrainOptions,
    n_classes: usize,
) -> Result<f32, TrainError> {
    let rows = prepared.x.nrows();
    let folds = options.folds.clamp(2, rows);
    let trees = options.trees.max(1);

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut indices: Vec<usize> = (0..rows).collect();
    indices.shuffle(&mut rng);

    let mut fold_accuracies = Vec::with_capacity(folds);
    for fold in 0..folds {
        let mut train_idx = Vec::with_capacity(rows);
        let mut test_idx = Vec::with_capacity(rows / folds + 1);
        for (position, &idx) in indices.iter().enumerate() {
            if position % folds == fold {
                test_idx.push(idx);
            } else {
                train_idx.push(idx);
            }
        }
        if train_idx.is_empty() || test_idx.is_empty() {
            continue;
        }
        let fitted = fit_bagged_trees(&prepared.x, &prepared.y, &train_idx, trees, &mut rng)?;
        let fold_forest = OutcomeForest {
            trees: fitted,
            schema: prepared.schema.clone(),
            scaler: prepared.scaler.clone(),
        };
        let mut confusion = ConfusionMatrix::new(n_classes);
        for &idx in &test_idx {
            let row: Vec<f64> = prepared.x.row(idx).to_vec();
            confusion.add(prepared.y[idx], fold_forest.predict_class_index(&row));
        }
        fold_accuracies.push(accuracy(&confusion));
    }
    if fold_accuracies.is_empty() {
        return Ok(0.0);
    }
    Ok(fold_accuracies.iter().sum::<f32>() / fold_accuracies.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::CandidateApplication;
    use crate::ml::forest::model::Outlook;
    use crate::tracker::{RecordId, Status};
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

    fn mixed_rows() -> Vec<ApplicationRecord> {
        vec![
            record("2024-03-01", "Full-time", "Tech", Status::Hired),
            record("2024-03-02", "Full-time", "Tech", Status::Hired),
            record("2024-03-03", "Internship", "Tech", Status::Hired),
            record("2024-03-04", "Full-time", "Fintech", Status::Hired),
            record("2024-03-05", "Full-time", "Tech", Status::Hired),
            record("2024-03-06", "Internship", "Fintech", Status::Rejected),
            record("2024-03-07", "Internship", "Fintech", Status::Rejected),
            record("2024-03-08", "Full-time", "Fintech", Status::Rejected),
        ]
    }

    fn quick_options() -> TrainOptions {
        TrainOptions {
            trees: 25,
            ..TrainOptions::default()
        }
    }

    #[test]
    fn single_status_table_reports_insufficient_classes() {
        let rows: Vec<_> = (1..=5)
            .map(|day| {
                record(
                    &format!("2024-03-0{day}"),
                    "Full-time",
                    "Tech",
                    Status::Waiting,
                )
            })
            .collect();
        let err = train_outcome_forest(&rows, &TrainOptions::default()).unwrap_err();
        assert!(matches!(err, TrainError::NotEnoughClasses { classes: 1 }));
    }

    #[test]
    fn too_few_rows_report_the_minimum() {
        let rows = vec![
            record("2024-03-01", "Full-time", "Tech", Status::Hired),
            record("2024-03-02", "Full-time", "Tech", Status::Rejected),
            record("2024-03-03", "Full-time", "Tech", Status::Hired),
            record("2024-03-04", "Full-time", "Tech", Status::Rejected),
        ];
        let err = train_outcome_forest(&rows, &TrainOptions::default()).unwrap_err();
        assert!(matches!(err, TrainError::NotEnoughRows { rows: 4, min: 8 }));
    }

    #[test]
    fn eight_mixed_rows_train_and_report() {
        let (forest, report) = train_outcome_forest(&mixed_rows(), &quick_options()).unwrap();
        assert_eq!(report.rows_used, 8);
        assert_eq!(report.rows_dropped, 0);
        assert_eq!(report.classes, vec!["Hired", "Rejected"]);
        assert!((0.0..=1.0).contains(&report.holdout_accuracy));
        assert!((0.0..=1.0).contains(&report.cv_accuracy));
        assert_eq!(forest.n_trees(), 25);

        let candidate = CandidateApplication {
            applied_on: date!(2024 - 03 - 09),
            employment_type: "Full-time".into(),
            sector: "Tech".into(),
        };
        let prediction = forest.predict_candidate(&candidate);
        assert!((0.0..=1.0).contains(&prediction.probability));

        let scaled = forest
            .scaler
            .transform_row(&forest.schema().encode_candidate(&candidate));
        let proba = forest.predict_proba(&scaled);
        assert_eq!(proba.len(), 2);
        let sum: f64 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unseen_sector_still_scores_in_range() {
        let (forest, _) = train_outcome_forest(&mixed_rows(), &quick_options()).unwrap();
        let prediction = forest.predict_candidate(&CandidateApplication {
            applied_on: date!(2024 - 04 - 01),
            employment_type: "Contract".into(),
            sector: "Space".into(),
        });
        assert!((0.0..=1.0).contains(&prediction.probability));
    }

    #[test]
    fn unparseable_dates_are_dropped_not_fatal() {
        let mut rows = mixed_rows();
        rows.push(record("someday", "Full-time", "Tech", Status::Hired));
        let (_, report) = train_outcome_forest(&rows, &quick_options()).unwrap();
        assert_eq!(report.rows_used, 8);
        assert_eq!(report.rows_dropped, 1);
    }

    #[test]
    fn training_is_deterministic() {
        let rows = mixed_rows();
        let options = quick_options();
        let (forest_a, report_a) = train_outcome_forest(&rows, &options).unwrap();
        let (forest_b, report_b) = train_outcome_forest(&rows, &options).unwrap();
        assert_eq!(report_a.holdout_accuracy, report_b.holdout_accuracy);
        assert_eq!(report_a.cv_accuracy, report_b.cv_accuracy);
        assert_eq!(report_a.confusion.counts, report_b.confusion.counts);

        let candidate = CandidateApplication {
            applied_on: date!(2024 - 03 - 10),
            employment_type: "Internship".into(),
            sector: "Fintech".into(),
        };
        let prediction_a = forest_a.predict_candidate(&candidate);
        let prediction_b = forest_b.predict_candidate(&candidate);
        assert_eq!(prediction_a.probability, prediction_b.probability);
    }

    #[test]
    fn favorable_status_never_observed_scores_zero() {
        let rows: Vec<_> = (1..=8)
            .map(|day| {
                let status = if day % 2 == 0 {
                    Status::Waiting
                } else {
                    Status::Rejected
                };
                record(&format!("2024-03-0{day}"), "Full-time", "Tech", status)
            })
            .collect();
        let (forest, _) = train_outcome_forest(&rows, &quick_options()).unwrap();
        let prediction = forest.predict_candidate(&CandidateApplication {
            applied_on: date!(2024 - 03 - 09),
            employment_type: "Full-time".into(),
            sector: "Tech".into(),
        });
        assert_eq!(prediction.probability, 0.0);
        assert_eq!(prediction.outlook, Outlook::KeepGoing);
    }
}
