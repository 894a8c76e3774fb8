//! Machine learning building blocks for the outcome estimator.
//!
//! Feature preparation, the seeded bagged-tree classifier and the evaluation
//! metrics reported after training.

pub mod features;
pub mod forest;
pub mod metrics;
