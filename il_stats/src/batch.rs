//! Per-feature comparison batches.
//!
//! Runs one test per feature column of a wide table, isolates per-feature
//! failures, and applies Benjamini-Hochberg correction across exactly the
//! p-values of this batch. Features are independent, so the fan-out is
//! parallel; output order is deterministic regardless.

use crate::correction::benjamini_hochberg;
use crate::error::StatsError;
use crate::summary::Measurement;
use crate::testing::{anova_oneway, kruskal_wallis, spearman, TestOutcome};
use il_types::{DetHashMap, WideTable};
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;

/// Which group-comparison test to run per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupTest {
    AnovaOneway,
    KruskalWallis,
}

impl GroupTest {
    fn run(self, groups: &[Vec<f64>]) -> Result<TestOutcome, StatsError> {
        match self {
            GroupTest::AnovaOneway => anova_oneway(groups),
            GroupTest::KruskalWallis => kruskal_wallis(groups),
        }
    }
}

/// One feature's test result within a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureComparison {
    pub feature: String,
    pub statistic: f64,
    pub p_value: f64,
    pub adjusted_p: f64,
}

/// A feature/group pair excluded because the group had no observed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingExclusion {
    pub feature: String,
    pub group: String,
}

/// A feature whose comparison failed. Recorded; never aborts the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureFailure {
    pub feature: String,
    pub error: StatsError,
}

/// The outcome of one comparison batch: successful comparisons sorted by
/// descending statistic, isolated failures, and recorded exclusions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub comparisons: Vec<FeatureComparison>,
    pub failures: Vec<FeatureFailure>,
    pub exclusions: Vec<MissingExclusion>,
}

struct FeatureResult {
    feature: String,
    outcome: Result<TestOutcome, StatsError>,
    exclusions: Vec<MissingExclusion>,
}

/// Compare every feature column of `wide` across the groups given by
/// `group_of` (normalized barcode string to group label).
///
/// Samples without a group label are left out. A group with no observed
/// value for a feature is excluded for that feature and recorded; a feature
/// with fewer than two populated groups fails with `InsufficientGroups`
/// while the rest of the batch proceeds.
pub fn compare_features(
    wide: &WideTable,
    group_of: &DetHashMap<String, String>,
    test: GroupTest,
    measurement: Measurement,
) -> Result<BatchReport, StatsError> {
    let labels: Vec<&String> = wide
        .rows
        .iter()
        .filter_map(|row| group_of.get(row.aliquot.as_str()))
        .unique()
        .sorted()
        .collect();
    let unlabeled = wide
        .rows
        .iter()
        .filter(|row| !group_of.contains_key(row.aliquot.as_str()))
        .count();
    if unlabeled > 0 {
        log::info!("{}: {unlabeled} samples have no group label", wide.source);
    }

    let results: Vec<FeatureResult> = (0..wide.features.len())
        .into_par_iter()
        .map(|col| {
            let feature = wide.features[col].clone();
            let mut groups: Vec<Vec<f64>> = Vec::with_capacity(labels.len());
            let mut exclusions = Vec::new();
            for &label in &labels {
                let values: Vec<f64> = wide
                    .rows
                    .iter()
                    .filter(|row| group_of.get(row.aliquot.as_str()) == Some(label))
                    .filter_map(|row| row.values[col])
                    .map(|v| measurement.stabilize(v))
                    .collect();
                if values.is_empty() {
                    exclusions.push(MissingExclusion {
                        feature: feature.clone(),
                        group: label.clone(),
                    });
                } else {
                    groups.push(values);
                }
            }
            let outcome = if groups.len() < 2 {
                Err(StatsError::InsufficientGroups { found: groups.len() })
            } else {
                test.run(&groups)
            };
            FeatureResult {
                feature,
                outcome,
                exclusions,
            }
        })
        .collect();

    finish_batch(results)
}

/// Correlate every feature column of `wide` against a per-sample numeric
/// covariate (e.g. leukocyte fraction), Spearman per feature. Only samples
/// with both a covariate and an observed cell contribute.
pub fn associate_features(
    wide: &WideTable,
    covariate: &DetHashMap<String, f64>,
    measurement: Measurement,
) -> Result<BatchReport, StatsError> {
    let results: Vec<FeatureResult> = (0..wide.features.len())
        .into_par_iter()
        .map(|col| {
            let feature = wide.features[col].clone();
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for row in &wide.rows {
                let (Some(&cov), Some(value)) =
                    (covariate.get(row.aliquot.as_str()), row.values[col])
                else {
                    continue;
                };
                xs.push(measurement.stabilize(value));
                ys.push(cov);
            }
            FeatureResult {
                feature,
                outcome: spearman(&xs, &ys),
                exclusions: Vec::new(),
            }
        })
        .collect();

    finish_batch(results)
}

/// Apply the batch-wide correction and assemble the report. Adjustment runs
/// over the p-values of this batch only.
fn finish_batch(results: Vec<FeatureResult>) -> Result<BatchReport, StatsError> {
    let mut report = BatchReport::default();
    let mut succeeded: Vec<(String, TestOutcome)> = Vec::new();

    for result in results {
        report.exclusions.extend(result.exclusions);
        match result.outcome {
            Ok(outcome) => succeeded.push((result.feature, outcome)),
            Err(error) => report.failures.push(FeatureFailure {
                feature: result.feature,
                error,
            }),
        }
    }

    let raw: Vec<f64> = succeeded.iter().map(|(_, o)| o.p_value).collect();
    let adjusted = benjamini_hochberg(&raw)?;

    report.comparisons = succeeded
        .into_iter()
        .zip(adjusted)
        .map(|((feature, outcome), adjusted_p)| FeatureComparison {
            feature,
            statistic: outcome.statistic,
            p_value: outcome.p_value,
            adjusted_p,
        })
        .collect();
    report.comparisons.sort_by(|a, b| {
        b.statistic
            .total_cmp(&a.statistic)
            .then_with(|| a.feature.cmp(&b.feature))
    });

    if !report.failures.is_empty() {
        log::warn!(
            "batch: {} of {} features failed: {}",
            report.failures.len(),
            report.failures.len() + report.comparisons.len(),
            report.failures.iter().map(|f| f.feature.as_str()).join(", ")
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aliquot::AliquotBarcode;
    use il_types::WideRow;

    fn wide(features: &[&str], rows: &[(&str, &[Option<f64>])]) -> WideTable {
        WideTable {
            source: "expr".to_string(),
            features: features.iter().map(|f| f.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(barcode, values)| WideRow {
                    aliquot: AliquotBarcode::from(*barcode),
                    values: values.to_vec(),
                })
                .collect(),
        }
    }

    fn groups_of(pairs: &[(&str, &str)]) -> DetHashMap<String, String> {
        pairs
            .iter()
            .map(|(b, g)| (b.to_string(), g.to_string()))
            .collect()
    }

    const S1: &str = "PROJ-AB-0001-01A-11D-1111-05";
    const S2: &str = "PROJ-AB-0002-01A-11D-1111-05";
    const S3: &str = "PROJ-AB-0003-01A-11D-1111-05";
    const S4: &str = "PROJ-AB-0004-01A-11D-1111-05";
    const S5: &str = "PROJ-AB-0005-01A-11D-1111-05";
    const S6: &str = "PROJ-AB-0006-01A-11D-1111-05";

    fn six_sample_groups() -> DetHashMap<String, String> {
        groups_of(&[
            (S1, "C1"),
            (S2, "C1"),
            (S3, "C1"),
            (S4, "C2"),
            (S5, "C2"),
            (S6, "C2"),
        ])
    }

    #[test]
    fn test_batch_isolates_failures_and_records_exclusions() {
        // SEP separates the groups cleanly; GONE has no observed value in
        // C2, leaving one populated group.
        let table = wide(
            &["GONE", "SEP"],
            &[
                (S1, &[Some(1.0), Some(1.0)]),
                (S2, &[Some(2.0), Some(2.0)]),
                (S3, &[Some(1.5), Some(3.0)]),
                (S4, &[None, Some(100.0)]),
                (S5, &[None, Some(101.0)]),
                (S6, &[None, Some(102.0)]),
            ],
        );
        let report = compare_features(
            &table,
            &six_sample_groups(),
            GroupTest::AnovaOneway,
            Measurement::LogSpace,
        )
        .unwrap();

        assert_eq!(report.comparisons.len(), 1);
        assert_eq!(report.comparisons[0].feature, "SEP");
        assert!(report.comparisons[0].p_value < 0.01);
        // One p-value in the batch: the adjustment changes nothing.
        assert_eq!(report.comparisons[0].adjusted_p, report.comparisons[0].p_value);

        assert_eq!(
            report.failures,
            vec![FeatureFailure {
                feature: "GONE".to_string(),
                error: StatsError::InsufficientGroups { found: 1 },
            }]
        );
        assert_eq!(
            report.exclusions,
            vec![MissingExclusion {
                feature: "GONE".to_string(),
                group: "C2".to_string(),
            }]
        );
    }

    #[test]
    fn test_batch_sorted_by_descending_statistic() {
        let table = wide(
            &["WEAK", "STRONG"],
            &[
                (S1, &[Some(1.0), Some(1.0)]),
                (S2, &[Some(2.0), Some(2.0)]),
                (S3, &[Some(3.0), Some(3.0)]),
                (S4, &[Some(2.0), Some(200.0)]),
                (S5, &[Some(3.0), Some(201.0)]),
                (S6, &[Some(4.0), Some(202.0)]),
            ],
        );
        let report = compare_features(
            &table,
            &six_sample_groups(),
            GroupTest::AnovaOneway,
            Measurement::LogSpace,
        )
        .unwrap();

        assert_eq!(report.comparisons.len(), 2);
        assert_eq!(report.comparisons[0].feature, "STRONG");
        assert!(report.comparisons[0].statistic > report.comparisons[1].statistic);
        for c in &report.comparisons {
            assert!(c.adjusted_p >= c.p_value);
        }
    }

    #[test]
    fn test_kruskal_batch_runs() {
        let table = wide(
            &["SEP"],
            &[
                (S1, &[Some(1.0)]),
                (S2, &[Some(2.0)]),
                (S3, &[Some(3.0)]),
                (S4, &[Some(100.0)]),
                (S5, &[Some(101.0)]),
                (S6, &[Some(102.0)]),
            ],
        );
        let report = compare_features(
            &table,
            &six_sample_groups(),
            GroupTest::KruskalWallis,
            Measurement::LogSpace,
        )
        .unwrap();
        assert_eq!(report.comparisons.len(), 1);
        assert!(report.comparisons[0].p_value < 0.1);
    }

    #[test]
    fn test_single_label_fails_every_feature() {
        let table = wide(&["A"], &[(S1, &[Some(1.0)]), (S2, &[Some(2.0)])]);
        let report = compare_features(
            &table,
            &groups_of(&[(S1, "C1"), (S2, "C1")]),
            GroupTest::AnovaOneway,
            Measurement::LogSpace,
        )
        .unwrap();
        assert!(report.comparisons.is_empty());
        assert_eq!(
            report.failures[0].error,
            StatsError::InsufficientGroups { found: 1 }
        );
    }

    #[test]
    fn test_associate_features_spearman() {
        let table = wide(
            &["UP", "FLAT"],
            &[
                (S1, &[Some(1.0), Some(7.0)]),
                (S2, &[Some(2.0), Some(7.0)]),
                (S3, &[Some(3.0), Some(7.0)]),
                (S4, &[Some(4.0), Some(7.0)]),
            ],
        );
        let covariate: DetHashMap<String, f64> = [
            (S1.to_string(), 0.1),
            (S2.to_string(), 0.2),
            (S3.to_string(), 0.3),
            (S4.to_string(), 0.4),
        ]
        .into_iter()
        .collect();

        let report = associate_features(&table, &covariate, Measurement::LogSpace).unwrap();
        assert_eq!(report.comparisons.len(), 2);
        assert_eq!(report.comparisons[0].feature, "UP");
        assert!((report.comparisons[0].statistic - 1.0).abs() < 1e-12);
        assert_eq!(report.comparisons[1].feature, "FLAT");
        assert_eq!(report.comparisons[1].statistic, 0.0);
    }

    #[test]
    fn test_associate_too_few_pairs_is_isolated() {
        let table = wide(&["A"], &[(S1, &[Some(1.0)]), (S2, &[Some(2.0)])]);
        let covariate: DetHashMap<String, f64> =
            [(S1.to_string(), 0.1), (S2.to_string(), 0.2)].into_iter().collect();
        let report = associate_features(&table, &covariate, Measurement::LogSpace).unwrap();
        assert!(report.comparisons.is_empty());
        assert_eq!(
            report.failures[0].error,
            StatsError::InsufficientObservations { found: 2, required: 3 }
        );
    }
}
