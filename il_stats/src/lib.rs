//! Grouped statistical summaries for matched cohort tables.
//!
//! Responsibilities end where the external statistics library begins: this
//! crate owns grouping, the variance-stabilizing transform decision, and
//! batch-wise multiple-testing correction; test-statistic-to-p-value
//! conversion is delegated to `statrs` distributions.

pub mod batch;
pub mod correction;
pub mod descriptive;
pub mod error;
pub mod rank;
pub mod summary;
pub mod testing;

pub use batch::{
    associate_features, compare_features, BatchReport, FeatureComparison, FeatureFailure,
    GroupTest, MissingExclusion,
};
pub use correction::benjamini_hochberg;
pub use error::StatsError;
pub use summary::{summarize_groups, GroupSummary, Measurement};
pub use testing::{anova_oneway, kruskal_wallis, spearman, TestOutcome};
