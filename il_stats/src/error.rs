//! Typed failure kinds for statistical operations.
//!
//! Per-feature failures are isolated and recorded by the batch runner; they
//! never abort processing of other features in the same batch.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum StatsError {
    /// Fewer than two groups remained for a comparison.
    #[error("fewer than two groups present for comparison, found {found}")]
    InsufficientGroups { found: usize },

    /// A group contributed no observations.
    #[error("group {group} is empty")]
    EmptyGroup { group: usize },

    /// Not enough observations for the requested test.
    #[error("need at least {required} observations, found {found}")]
    InsufficientObservations { found: usize, required: usize },

    /// Paired inputs of different lengths.
    #[error("paired inputs differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// A p-value outside [0, 1] was handed to the correction step.
    #[error("p-value at index {index} is outside [0, 1]: {value}")]
    InvalidPValue { index: usize, value: f64 },

    /// The external statistics library rejected the distribution parameters.
    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
}
