use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Axis};

use crate::ml::features::{CandidateApplication, FeatureSchema, StandardScaler};

/// Vote share above which an outlook counts as a likely success.
pub const SUCCESS_THRESHOLD: f64 = 0.5;

/// Verdict attached to a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlook {
    LikelySuccess,
    /// Below the threshold; discouraging but not terminal.
    KeepGoing,
}

impl Outlook {
    /// Apply the fixed threshold; exactly the threshold is not a success.
    pub fn from_probability(probability: f64) -> Self {
        if probability > SUCCESS_THRESHOLD {
            Outlook::LikelySuccess
        } else {
            Outlook::KeepGoing
        }
    }
}

/// Probability plus verdict for one candidate application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Share of trees voting the favorable outcome, within `[0, 1]`.
    pub probability: f64,
    pub outlook: Outlook,
}

/// Bagged decision trees plus the encoding artifacts fitted alongside them.
#[derive(Debug, Clone)]
pub struct OutcomeForest {
    pub(super) trees: Vec<DecisionTree<f64, usize>>,
    pub(super) schema: FeatureSchema,
    pub(super) scaler: StandardScaler,
}

impl OutcomeForest {
    /// Column layout and class vocabulary this forest was fitted with.
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Number of bagged trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Class-vote shares for a standardized feature row.
    ///
    /// One share per schema class; an empty vector when the row width does
    /// not match the schema.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        if features.len() != self.schema.width() || self.trees.is_empty() {
            return Vec::new();
        }
        let row = Array1::from(features.to_vec()).insert_axis(Axis(0));
        let mut votes = vec![0usize; self.schema.classes.len()];
        for tree in &self.trees {
            let predicted = tree.predict(&row);
            if let Some(&class) = predicted.get(0) {
                if class < votes.len() {
                    votes[class] += 1;
                }
            }
        }
        let total = self.trees.len() as f64;
        votes.into_iter().map(|count| count as f64 / total).collect()
    }

    /// Majority-vote class index for a standardized feature row.
    pub fn predict_class_index(&self, features: &[f64]) -> usize {
        argmax(&self.predict_proba(features))
    }

    /// Score a hypothetical application.
    ///
    /// Categories unseen at fit time encode to the one-hot baseline, so
    /// this never fails. The probability is the favorable-outcome vote
    /// share; a forest holding a single class reports that class's share.
    pub fn predict_candidate(&self, candidate: &CandidateApplication) -> Prediction {
        let encoded = self.schema.encode_candidate(candidate);
        let scaled = self.scaler.transform_row(&encoded);
        let proba = self.predict_proba(&scaled);
        let probability = match self.schema.favorable_class() {
            Some(class) => proba.get(class).copied().unwrap_or(0.0),
            None if proba.len() == 1 => proba[0],
            None => 0.0,
        };
        Prediction {
            probability,
            outlook: Outlook::from_probability(probability),
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best_idx = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_val {
            best_val = value;
            best_idx = idx;
        }
    }
    best_idx
}
