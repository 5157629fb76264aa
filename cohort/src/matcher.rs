//! Sample-set matcher.
//!
//! Joins two row sets on vial id, then requires byte-equal portion ids. A
//! subject may contribute multiple physical portions to different assays, so
//! a vial-id join alone silently creates spurious sample pairs; the portion
//! guard rejects those, and every rejection is reported for audit rather
//! than dropped.

use aliquot::HasAliquot;
use il_types::{DetHashMap, DetHashSet};
use serde::{Deserialize, Serialize};

/// A vial-id match whose portion ids disagree. Reported, never silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortionMismatch {
    pub vial_id: String,
    pub left: String,
    pub right: String,
}

/// Counts and rejects from one join, mergeable across joins of the same
/// shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAudit {
    pub left_rows: usize,
    pub right_rows: usize,
    pub matched_pairs: usize,
    /// Left rows whose vial id is absent from the right table.
    pub left_unmatched: usize,
    /// Right rows whose vial id is absent from the left table.
    pub right_unmatched: usize,
    pub portion_mismatches: Vec<PortionMismatch>,
}

impl JoinAudit {
    /// Combine with the audit of another join, consuming it.
    pub fn merge(&mut self, other: JoinAudit) {
        self.left_rows += other.left_rows;
        self.right_rows += other.right_rows;
        self.matched_pairs += other.matched_pairs;
        self.left_unmatched += other.left_unmatched;
        self.right_unmatched += other.right_unmatched;
        self.portion_mismatches.extend(other.portion_mismatches);
    }

    /// Render the audit as a JSON report for export collaborators.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("audit serialization cannot fail")
    }
}

/// The result of matching two row sets: all candidate pairs plus the audit.
/// Duplicate plates produce multiple pairs per row; deduplication is the
/// aggregator's concern, not the matcher's.
#[derive(Debug)]
pub struct MatchedCohort<'a, L, R> {
    pub pairs: Vec<(&'a L, &'a R)>,
    pub audit: JoinAudit,
}

/// Match `left` against `right`: vial ids must join and portion ids must be
/// byte-equal. Symmetric: swapping the arguments yields the same pair set
/// with the sides flipped.
pub fn match_rows<'a, L: HasAliquot, R: HasAliquot>(
    left: &'a [L],
    right: &'a [R],
) -> MatchedCohort<'a, L, R> {
    let mut right_by_vial: DetHashMap<&str, Vec<&R>> = DetHashMap::default();
    for r in right {
        right_by_vial.entry(r.aliquot().vial_id()).or_default().push(r);
    }

    let mut audit = JoinAudit {
        left_rows: left.len(),
        right_rows: right.len(),
        ..JoinAudit::default()
    };
    let mut pairs = Vec::new();
    for l in left {
        let Some(candidates) = right_by_vial.get(l.aliquot().vial_id()) else {
            audit.left_unmatched += 1;
            continue;
        };
        for &r in candidates {
            if l.aliquot().same_portion(r.aliquot()) {
                pairs.push((l, r));
            } else {
                audit.portion_mismatches.push(PortionMismatch {
                    vial_id: l.aliquot().vial_id().to_string(),
                    left: l.aliquot().as_str().to_string(),
                    right: r.aliquot().as_str().to_string(),
                });
            }
        }
    }

    let left_vials: DetHashSet<&str> = left.iter().map(|l| l.aliquot().vial_id()).collect();
    audit.right_unmatched = right
        .iter()
        .filter(|r| !left_vials.contains(r.aliquot().vial_id()))
        .count();
    audit.matched_pairs = pairs.len();

    if audit.left_unmatched > 0 || audit.right_unmatched > 0 {
        log::warn!(
            "vial-id join left {} left and {} right rows unmatched",
            audit.left_unmatched,
            audit.right_unmatched
        );
    }
    if !audit.portion_mismatches.is_empty() {
        log::warn!(
            "rejected {} vial-id matches with differing portion ids",
            audit.portion_mismatches.len()
        );
    }

    MatchedCohort { pairs, audit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aliquot::AliquotBarcode;

    fn bc(s: &str) -> AliquotBarcode {
        AliquotBarcode::from(s)
    }

    #[test]
    fn test_portion_guard_rejects_cross_portion_pair() {
        // Two aliquots share a vial but come from different portions; the
        // right table only measured the first portion.
        let left = vec![
            bc("PROJ-AB-0001-01A-11D-1111-05"),
            bc("PROJ-AB-0001-01A-21D-2222-05"),
        ];
        let right = vec![bc("PROJ-AB-0001-01A-11D-3333-01")];

        let matched = match_rows(&left, &right);
        assert_eq!(matched.pairs.len(), 1);
        assert_eq!(matched.pairs[0].0.as_str(), "PROJ-AB-0001-01A-11D-1111-05");

        assert_eq!(matched.audit.matched_pairs, 1);
        assert_eq!(matched.audit.left_unmatched, 0);
        assert_eq!(matched.audit.right_unmatched, 0);
        assert_eq!(
            matched.audit.portion_mismatches,
            vec![PortionMismatch {
                vial_id: "PROJ-AB-0001-01A".to_string(),
                left: "PROJ-AB-0001-01A-21D-2222-05".to_string(),
                right: "PROJ-AB-0001-01A-11D-3333-01".to_string(),
            }]
        );
    }

    #[test]
    fn test_unmatched_counted_not_fatal() {
        let left = vec![
            bc("PROJ-AB-0001-01A-11D-1111-05"),
            bc("PROJ-AB-0002-01A-11D-1111-05"),
        ];
        let right = vec![
            bc("PROJ-AB-0001-01A-11D-3333-01"),
            bc("PROJ-AB-0009-01A-11D-3333-01"),
        ];
        let matched = match_rows(&left, &right);
        assert_eq!(matched.pairs.len(), 1);
        assert_eq!(matched.audit.left_unmatched, 1);
        assert_eq!(matched.audit.right_unmatched, 1);
    }

    #[test]
    fn test_duplicate_plates_yield_all_candidate_pairs() {
        // The same portion assayed on two plates: both pairs come back.
        let left = vec![bc("PROJ-AB-0001-01A-11D-1111-05")];
        let right = vec![
            bc("PROJ-AB-0001-01A-11D-3333-01"),
            bc("PROJ-AB-0001-01A-11D-4444-01"),
        ];
        let matched = match_rows(&left, &right);
        assert_eq!(matched.pairs.len(), 2);
    }

    #[test]
    fn test_symmetric() {
        let a = vec![
            bc("PROJ-AB-0001-01A-11D-1111-05"),
            bc("PROJ-AB-0001-01A-21D-2222-05"),
            bc("PROJ-AB-0002-01A-11D-1111-05"),
        ];
        let b = vec![
            bc("PROJ-AB-0001-01A-11D-3333-01"),
            bc("PROJ-AB-0003-01A-11D-3333-01"),
        ];
        let ab = match_rows(&a, &b);
        let ba = match_rows(&b, &a);

        let mut ab_pairs: Vec<(&str, &str)> = ab
            .pairs
            .iter()
            .map(|(l, r)| (l.as_str(), r.as_str()))
            .collect();
        let mut ba_pairs: Vec<(&str, &str)> = ba
            .pairs
            .iter()
            .map(|(l, r)| (r.as_str(), l.as_str()))
            .collect();
        ab_pairs.sort_unstable();
        ba_pairs.sort_unstable();
        assert_eq!(ab_pairs, ba_pairs);

        assert_eq!(ab.audit.left_unmatched, ba.audit.right_unmatched);
        assert_eq!(ab.audit.right_unmatched, ba.audit.left_unmatched);
        assert_eq!(
            ab.audit.portion_mismatches.len(),
            ba.audit.portion_mismatches.len()
        );
    }

    #[test]
    fn test_audit_merge_and_json() {
        let left = vec![bc("PROJ-AB-0001-01A-11D-1111-05")];
        let right = vec![bc("PROJ-AB-0001-01A-11D-3333-01")];
        let mut audit = match_rows(&left, &right).audit;
        let other = match_rows(&left, &right).audit;
        audit.merge(other);
        assert_eq!(audit.matched_pairs, 2);
        assert_eq!(audit.left_rows, 2);

        let json = audit.to_json();
        assert_eq!(json["matched_pairs"], 2);
        assert_eq!(json["portion_mismatches"].as_array().unwrap().len(), 0);
    }
}
