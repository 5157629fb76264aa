//! Curated feature annotation.
//!
//! The immunomodulator gene list: one entry per gene symbol with its HGNC id
//! and functional category. Analyses restrict expression tables to this list
//! before aggregation.

use crate::hasher::DetHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One curated gene entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureAnnotation {
    pub symbol: String,
    pub hgnc_id: Option<String>,
    /// Functional category, e.g. "Stimulatory" or "Inhibitory".
    pub category: String,
}

/// Annotation table keyed by gene symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureAnnotationTable {
    by_symbol: DetHashMap<String, FeatureAnnotation>,
}

impl FeatureAnnotationTable {
    pub fn get(&self, symbol: &str) -> Option<&FeatureAnnotation> {
        self.by_symbol.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// All annotated symbols, alphabetically.
    pub fn symbols(&self) -> Vec<&str> {
        self.by_symbol.keys().map(String::as_str).sorted().collect()
    }
}

impl FromIterator<FeatureAnnotation> for FeatureAnnotationTable {
    /// Build the table from entries. A symbol listed twice keeps its first
    /// entry; the duplicate is logged and dropped.
    fn from_iter<I: IntoIterator<Item = FeatureAnnotation>>(iter: I) -> Self {
        let mut by_symbol = DetHashMap::default();
        for ann in iter {
            if by_symbol.contains_key(&ann.symbol) {
                log::warn!("duplicate annotation for symbol {}, keeping first", ann.symbol);
                continue;
            }
            by_symbol.insert(ann.symbol.clone(), ann);
        }
        FeatureAnnotationTable { by_symbol }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(symbol: &str, category: &str) -> FeatureAnnotation {
        FeatureAnnotation {
            symbol: symbol.to_string(),
            hgnc_id: None,
            category: category.to_string(),
        }
    }

    #[test]
    fn test_lookup_and_order() {
        let table: FeatureAnnotationTable =
            [ann("IDO1", "Inhibitory"), ann("CD28", "Stimulatory")]
                .into_iter()
                .collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("IDO1").unwrap().category, "Inhibitory");
        assert_eq!(table.symbols(), vec!["CD28", "IDO1"]);
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let table: FeatureAnnotationTable =
            [ann("CD28", "Stimulatory"), ann("CD28", "Inhibitory")]
                .into_iter()
                .collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("CD28").unwrap().category, "Stimulatory");
    }
}
