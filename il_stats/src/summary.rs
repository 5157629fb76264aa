//! Per-group descriptive summaries.

use crate::descriptive::{median, variance};
use il_types::DetHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How a numeric column was measured. Raw (non-log) expression measurements
/// get a variance-stabilizing `ln(x + 1)` transform before any statistic or
/// comparison; values already in log space are left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measurement {
    RawCounts,
    LogSpace,
}

impl Measurement {
    /// Apply the variance-stabilizing transform when the input is raw.
    pub fn stabilize(self, x: f64) -> f64 {
        match self {
            Measurement::RawCounts => (x + 1.0).ln(),
            Measurement::LogSpace => x,
        }
    }
}

/// Median, count, and sample variance of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub count: usize,
    pub median: f64,
    /// `None` when the group has a single observation.
    pub variance: Option<f64>,
}

/// Summarize a numeric column per group, applying the transform dictated by
/// `measurement` first. Groups come back sorted by name.
pub fn summarize_groups<'a, I>(values: I, measurement: Measurement) -> Vec<GroupSummary>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut by_group: DetHashMap<&str, Vec<f64>> = DetHashMap::default();
    for (group, value) in values {
        by_group.entry(group).or_default().push(measurement.stabilize(value));
    }

    by_group
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(group, xs)| GroupSummary {
            group: group.to_string(),
            count: xs.len(),
            median: median(&xs).expect("group is non-empty by construction"),
            variance: variance(&xs),
        })
        .collect()
}
