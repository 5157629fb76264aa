//! Long-to-wide aggregation.
//!
//! Collapses duplicate assay replicates by arithmetic mean, then pivots to
//! one column per feature. Missing measurements are never fabricated: a
//! (sample, feature) group with no observed replicate stays null, and strict
//! mode drops any feature that is missing for at least one sample.

use aliquot::AliquotBarcode;
use il_types::{AssayRow, AssayTable, DetHashMap, DetHashSet, WideRow, WideTable};
use itertools::Itertools;

/// What to do with a feature that has a missing value for some sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Drop the feature column entirely ("remove genes with any missing
    /// sample").
    Strict,
    /// Keep the feature; missing cells pass through as null.
    Keep,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CohortError {
    #[error("column ordering names feature '{feature}' which is not present in the table")]
    UnknownOrderColumn { feature: String },

    #[error("column ordering is missing observed feature '{feature}'")]
    MissingOrderColumn { feature: String },

    #[error("column ordering lists feature '{feature}' more than once")]
    DuplicateOrderColumn { feature: String },
}

#[derive(Default)]
struct Cell {
    sum: f64,
    observed: usize,
}

impl Cell {
    fn mean(&self) -> Option<f64> {
        (self.observed > 0).then(|| self.sum / self.observed as f64)
    }
}

/// Pivot a long table to wide form.
///
/// Duplicate (sample, feature) replicates collapse by arithmetic mean of the
/// observed values before pivoting. Sample rows keep first-appearance order;
/// feature columns are alphabetical unless `order` supplies an explicit
/// ordering, which must be an exact permutation of the observed feature set.
pub fn aggregate(
    table: &AssayTable,
    policy: MissingPolicy,
    order: Option<&[String]>,
) -> Result<WideTable, CohortError> {
    let mut samples: Vec<&AliquotBarcode> = Vec::new();
    let mut seen = DetHashSet::default();
    let mut observed: DetHashSet<&str> = DetHashSet::default();
    let mut cells: DetHashMap<(&str, &str), Cell> = DetHashMap::default();

    for row in &table.rows {
        if seen.insert(row.aliquot.as_str()) {
            samples.push(&row.aliquot);
        }
        observed.insert(row.feature.as_str());
        let cell = cells
            .entry((row.aliquot.as_str(), row.feature.as_str()))
            .or_default();
        if let Some(v) = row.value {
            cell.sum += v;
            cell.observed += 1;
        }
    }

    let features: Vec<String> = match order {
        None => observed.iter().sorted().map(|f| f.to_string()).collect(),
        Some(order) => {
            let mut listed = DetHashSet::default();
            for feature in order {
                if !observed.contains(feature.as_str()) {
                    return Err(CohortError::UnknownOrderColumn {
                        feature: feature.clone(),
                    });
                }
                if !listed.insert(feature.as_str()) {
                    return Err(CohortError::DuplicateOrderColumn {
                        feature: feature.clone(),
                    });
                }
            }
            if let Some(missing) = observed.iter().find(|f| !listed.contains(*f)) {
                return Err(CohortError::MissingOrderColumn {
                    feature: missing.to_string(),
                });
            }
            order.to_vec()
        }
    };

    let features: Vec<String> = match policy {
        MissingPolicy::Keep => features,
        MissingPolicy::Strict => {
            let complete = |feature: &String| {
                samples.iter().all(|sample| {
                    cells
                        .get(&(sample.as_str(), feature.as_str()))
                        .is_some_and(|cell| cell.observed > 0)
                })
            };
            let (kept, dropped): (Vec<String>, Vec<String>) =
                features.into_iter().partition(complete);
            if !dropped.is_empty() {
                log::warn!(
                    "{}: strict missing policy dropped {} of {} features: {}",
                    table.source,
                    dropped.len(),
                    kept.len() + dropped.len(),
                    dropped.iter().join(", ")
                );
            }
            kept
        }
    };

    let rows = samples
        .iter()
        .map(|sample| WideRow {
            aliquot: (*sample).clone(),
            values: features
                .iter()
                .map(|feature| {
                    cells
                        .get(&(sample.as_str(), feature.as_str()))
                        .and_then(Cell::mean)
                })
                .collect(),
        })
        .collect();

    Ok(WideTable {
        source: table.source.clone(),
        features,
        rows,
    })
}

/// Unpivot a wide table to long form, one row per cell including nulls, in
/// row-major order. For complete data this is the exact inverse of
/// [`aggregate`] with the wide table's own column order.
pub fn wide_to_long(wide: &WideTable) -> AssayTable {
    let rows = wide
        .rows
        .iter()
        .flat_map(|row| {
            wide.features
                .iter()
                .zip(&row.values)
                .map(|(feature, value)| AssayRow {
                    aliquot: row.aliquot.clone(),
                    feature: feature.clone(),
                    value: *value,
                })
        })
        .collect();
    AssayTable::new(wide.source.clone(), rows)
}
