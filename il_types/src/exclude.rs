//! Quality-control exclusion set.
//!
//! Samples flagged by pathology review or an explicit do-not-use flag are
//! removed from every downstream table before any join. The set is keyed by
//! the normalized barcode string so that tables loaded with different
//! separator conventions still hit it.

use crate::hasher::DetHashMap;
use aliquot::AliquotBarcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a sample was excluded from analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    /// The sample failed pathology review.
    FailedPathology,
    /// The sample carries an explicit do-not-use flag.
    DoNotUse,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::FailedPathology => f.write_str("failed_pathology"),
            ExclusionReason::DoNotUse => f.write_str("do_not_use"),
        }
    }
}

/// The set of barcodes that must be removed from every assay table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionSet {
    excluded: DetHashMap<String, ExclusionReason>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag a barcode. When a barcode is flagged for more than one reason,
    /// the explicit do-not-use flag wins.
    pub fn insert(&mut self, barcode: &AliquotBarcode, reason: ExclusionReason) {
        self.excluded
            .entry(barcode.as_str().to_string())
            .and_modify(|existing| {
                if reason == ExclusionReason::DoNotUse {
                    *existing = reason;
                }
            })
            .or_insert(reason);
    }

    pub fn contains(&self, barcode: &AliquotBarcode) -> bool {
        self.excluded.contains_key(barcode.as_str())
    }

    /// The recorded reason for a barcode, if it is excluded.
    pub fn reason(&self, barcode: &AliquotBarcode) -> Option<ExclusionReason> {
        self.excluded.get(barcode.as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

impl FromIterator<(AliquotBarcode, ExclusionReason)> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = (AliquotBarcode, ExclusionReason)>>(iter: I) -> Self {
        let mut set = ExclusionSet::new();
        for (barcode, reason) in iter {
            set.insert(&barcode, reason);
        }
        set
    }
}
