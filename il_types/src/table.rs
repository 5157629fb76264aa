//! Long- and wide-form assay tables.
//!
//! An assay table is keyed by aliquot barcode. The long form has one row per
//! sample x feature with an optional measurement; the wide form has one row
//! per sample and one column per feature. Conversion between the two lives in
//! the `cohort` crate and is lossless for complete data.

use crate::annotation::FeatureAnnotationTable;
use crate::exclude::ExclusionSet;
use crate::hasher::DetHashSet;
use aliquot::{AliquotBarcode, HasAliquot};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One long-form measurement: a sample, a feature, and an optional value.
/// `None` is a missing biological measurement, never a fabricated default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayRow {
    pub aliquot: AliquotBarcode,
    pub feature: String,
    pub value: Option<f64>,
}

impl HasAliquot for AssayRow {
    fn aliquot(&self) -> &AliquotBarcode {
        &self.aliquot
    }
}

/// A long-form assay table from a single data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayTable {
    /// Where the table came from, used in logs and audit reports.
    pub source: String,
    pub rows: Vec<AssayRow>,
}

impl AssayTable {
    pub fn new(source: impl Into<String>, rows: Vec<AssayRow>) -> Self {
        AssayTable {
            source: source.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct barcodes in first-appearance order.
    pub fn aliquots(&self) -> Vec<AliquotBarcode> {
        let mut seen = DetHashSet::default();
        self.rows
            .iter()
            .filter(|row| seen.insert(row.aliquot.as_str()))
            .map(|row| row.aliquot.clone())
            .collect()
    }

    /// Distinct feature names, alphabetically.
    pub fn feature_names(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.feature.as_str())
            .unique()
            .sorted()
            .map(String::from)
            .collect()
    }

    /// A new table with every excluded sample removed. Must run immediately
    /// after load, before any join.
    pub fn without_excluded(&self, exclusions: &ExclusionSet) -> AssayTable {
        let rows: Vec<AssayRow> = self
            .rows
            .iter()
            .filter(|row| !exclusions.contains(&row.aliquot))
            .cloned()
            .collect();
        let removed = self.rows.len() - rows.len();
        if removed > 0 {
            log::info!(
                "{}: removed {removed} of {} rows flagged by quality control",
                self.source,
                self.rows.len()
            );
        }
        AssayTable::new(self.source.clone(), rows)
    }

    /// A new table keeping only features present in the curated annotation.
    pub fn restrict_to_annotated(&self, annotation: &FeatureAnnotationTable) -> AssayTable {
        let rows: Vec<AssayRow> = self
            .rows
            .iter()
            .filter(|row| annotation.contains(&row.feature))
            .cloned()
            .collect();
        AssayTable::new(self.source.clone(), rows)
    }
}

/// One categorical label, e.g. an immune subtype assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRow {
    pub aliquot: AliquotBarcode,
    pub label: String,
}

impl HasAliquot for LabelRow {
    fn aliquot(&self) -> &AliquotBarcode {
        &self.aliquot
    }
}

/// A categorical label table, e.g. immune subtype per sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    pub source: String,
    pub rows: Vec<LabelRow>,
}

impl LabelTable {
    pub fn new(source: impl Into<String>, rows: Vec<LabelRow>) -> Self {
        LabelTable {
            source: source.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A new table with every excluded sample removed.
    pub fn without_excluded(&self, exclusions: &ExclusionSet) -> LabelTable {
        let rows: Vec<LabelRow> = self
            .rows
            .iter()
            .filter(|row| !exclusions.contains(&row.aliquot))
            .cloned()
            .collect();
        let removed = self.rows.len() - rows.len();
        if removed > 0 {
            log::info!(
                "{}: removed {removed} of {} rows flagged by quality control",
                self.source,
                self.rows.len()
            );
        }
        LabelTable::new(self.source.clone(), rows)
    }
}

/// One wide-form row: a sample and one optional value per feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub aliquot: AliquotBarcode,
    pub values: Vec<Option<f64>>,
}

impl HasAliquot for WideRow {
    fn aliquot(&self) -> &AliquotBarcode {
        &self.aliquot
    }
}

/// A wide-form table: one row per sample, one column per feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    pub source: String,
    /// Column order. Deterministic: alphabetical unless the caller supplied
    /// an explicit ordering at pivot time.
    pub features: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    /// The cell for a sample row and feature name.
    pub fn value(&self, row: usize, feature: &str) -> Option<f64> {
        let col = self.feature_index(feature)?;
        self.rows[row].values[col]
    }

    /// Iterate one feature column as (barcode, cell) pairs.
    pub fn column(&self, col: usize) -> impl Iterator<Item = (&AliquotBarcode, Option<f64>)> {
        self.rows.iter().map(move |row| (&row.aliquot, row.values[col]))
    }
}
