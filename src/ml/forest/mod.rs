//! Seeded bagged-decision-tree classifier for application outcomes.
//!
//! One training entry point fits the forest on a user's records and reports
//! holdout plus cross-validated accuracy; the fitted model bundles the
//! feature schema and scaler so a hypothetical application can be scored
//! without touching the store again.

mod model;
mod train;

pub use model::{Outlook, OutcomeForest, Prediction, SUCCESS_THRESHOLD};
pub use train::{TrainError, TrainOptions, TrainReport, train_outcome_forest};
