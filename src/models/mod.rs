//! # Models
//!
//! The workload-risk logistic model and plain-text reporting of its results.

pub mod logistic;
pub mod report;
