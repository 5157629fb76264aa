//! End-to-end cohort analyses.
//!
//! Each function composes the full reconciliation pipeline: exclusion
//! filter, then vial/portion match, then wide aggregation, then per-feature
//! statistics with batch-wide correction. Every step is a pure
//! transformation; nothing here holds state between calls.

use anyhow::{Context, Result};
use cohort::{aggregate, match_rows, JoinAudit, MissingPolicy};
use il_stats::{associate_features, compare_features, BatchReport, GroupTest, Measurement};
use il_types::{AssayTable, DetHashMap, ExclusionSet, LabelTable, WideTable};
use std::io::BufWriter;
use std::path::Path;

/// Output of a grouped comparison: the aggregated wide table, the ranked
/// per-feature report, and the join audit.
#[derive(Debug)]
pub struct CohortAnalysis {
    pub wide: WideTable,
    pub report: BatchReport,
    pub audit: JoinAudit,
}

/// Compare expression features across categorical subtype labels.
///
/// Both tables are filtered by the exclusion set first. Expression samples
/// are then matched against label rows on vial id with the portion-id guard;
/// only matched samples enter the wide table and the comparison batch.
pub fn subtype_comparison(
    expression: &AssayTable,
    subtypes: &LabelTable,
    exclusions: &ExclusionSet,
    test: GroupTest,
    measurement: Measurement,
    policy: MissingPolicy,
) -> Result<CohortAnalysis> {
    let expression = expression.without_excluded(exclusions);
    let subtypes = subtypes.without_excluded(exclusions);

    let samples = expression.aliquots();
    let matched = match_rows(&samples, &subtypes.rows);

    let mut group_of: DetHashMap<String, String> = DetHashMap::default();
    for (sample, label_row) in &matched.pairs {
        let existing = group_of
            .entry(sample.as_str().to_string())
            .or_insert_with(|| label_row.label.clone());
        if *existing != label_row.label {
            log::warn!(
                "{}: conflicting labels for {} ({existing} vs {}), keeping first",
                subtypes.source,
                sample.as_str(),
                label_row.label
            );
        }
    }

    let wide = aggregate(&keep_samples(&expression, &group_of), policy, None)?;
    let report = compare_features(&wide, &group_of, test, measurement)?;
    Ok(CohortAnalysis {
        wide,
        report,
        audit: matched.audit,
    })
}

/// Correlate expression features against a numeric per-sample covariate
/// (e.g. leukocyte fraction), Spearman per feature.
///
/// The covariate table is a long assay table; replicate covariate rows
/// collapse by mean, matching the aggregator's replicate policy. The
/// covariate itself is never transformed; `measurement` applies to the
/// expression side only.
pub fn covariate_association(
    expression: &AssayTable,
    covariate: &AssayTable,
    covariate_feature: &str,
    exclusions: &ExclusionSet,
    measurement: Measurement,
    policy: MissingPolicy,
) -> Result<CohortAnalysis> {
    let expression = expression.without_excluded(exclusions);
    let covariate = covariate.without_excluded(exclusions);

    // Mean-collapse the covariate per barcode, observed values only.
    let mut sums: DetHashMap<&str, (f64, usize)> = DetHashMap::default();
    for row in &covariate.rows {
        if row.feature != covariate_feature {
            continue;
        }
        if let Some(v) = row.value {
            let cell = sums.entry(row.aliquot.as_str()).or_insert((0.0, 0));
            cell.0 += v;
            cell.1 += 1;
        }
    }

    let samples = expression.aliquots();
    let covariate_samples = covariate.aliquots();
    let matched = match_rows(&samples, &covariate_samples);

    let mut covariate_of: DetHashMap<String, f64> = DetHashMap::default();
    for (sample, cov_sample) in &matched.pairs {
        if let Some(&(sum, n)) = sums.get(cov_sample.as_str()) {
            covariate_of
                .entry(sample.as_str().to_string())
                .or_insert(sum / n as f64);
        }
    }

    let wide = aggregate(&keep_samples(&expression, &covariate_of), policy, None)?;
    let report = associate_features(&wide, &covariate_of, measurement)?;
    Ok(CohortAnalysis {
        wide,
        report,
        audit: matched.audit,
    })
}

/// Run [`subtype_comparison`] straight from delimited files: an expression
/// table, a subtype table, and the quality-control table. When an annotation
/// file is given, expression features are restricted to the curated list
/// before anything else.
#[allow(clippy::too_many_arguments)]
pub fn subtype_comparison_from_files(
    expression_path: &Path,
    barcode_column: &str,
    subtype_path: &Path,
    label_column: &str,
    qc_path: &Path,
    annotation_path: Option<&Path>,
    test: GroupTest,
    measurement: Measurement,
    policy: MissingPolicy,
) -> Result<CohortAnalysis> {
    let mut expression = il_types::tsv::read_assay_table(expression_path, barcode_column)?;
    if let Some(annotation_path) = annotation_path {
        let annotation = il_types::tsv::read_feature_annotation(annotation_path)?;
        expression = expression.restrict_to_annotated(&annotation);
    }
    let subtypes = il_types::tsv::read_label_table(subtype_path, barcode_column, label_column)?;
    let exclusions = il_types::tsv::read_exclusion_set(qc_path, barcode_column)?;
    subtype_comparison(&expression, &subtypes, &exclusions, test, measurement, policy)
}

/// Per-group median/count/variance for one feature column of a wide table.
pub fn summarize_feature(
    wide: &WideTable,
    group_of: &DetHashMap<String, String>,
    feature: &str,
    measurement: Measurement,
) -> Vec<il_stats::GroupSummary> {
    let Some(col) = wide.feature_index(feature) else {
        return Vec::new();
    };
    il_stats::summarize_groups(
        wide.column(col).filter_map(|(aliquot, value)| {
            let group = group_of.get(aliquot.as_str())?;
            Some((group.as_str(), value?))
        }),
        measurement,
    )
}

/// A new table keeping only rows whose barcode is a key of `keep`.
fn keep_samples<V>(table: &AssayTable, keep: &DetHashMap<String, V>) -> AssayTable {
    AssayTable::new(
        table.source.clone(),
        table
            .rows
            .iter()
            .filter(|row| keep.contains_key(row.aliquot.as_str()))
            .cloned()
            .collect(),
    )
}

/// Write the ranked per-feature summary as tab-delimited text, already
/// sorted by descending statistic.
pub fn write_summary(path: &Path, report: &BatchReport) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| path.display().to_string())?;
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file));
    wtr.write_record(["feature", "statistic", "p_value", "adjusted_p"])?;
    for c in &report.comparisons {
        wtr.write_record([
            c.feature.as_str(),
            &c.statistic.to_string(),
            &c.p_value.to_string(),
            &c.adjusted_p.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
