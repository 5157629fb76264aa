//! Delimited-file adapters at the collaborator boundary.
//!
//! Inputs are tab-delimited text with a header row: assay tables with a
//! primary barcode column and one or more measurement columns, a
//! quality-control table with boolean exclusion flags, and the curated gene
//! annotation. Structural problems (missing file, absent required column,
//! unparseable cell) are fatal here; everything past this boundary works with
//! typed, per-row errors instead.

use crate::annotation::{FeatureAnnotation, FeatureAnnotationTable};
use crate::exclude::{ExclusionReason, ExclusionSet};
use crate::table::{AssayRow, AssayTable, LabelRow, LabelTable, WideTable};
use aliquot::AliquotBarcode;
use anyhow::{bail, Context, Result};
use csv::StringRecord;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Cell contents treated as a missing measurement.
const MISSING_CELLS: [&str; 3] = ["", "NA", "NaN"];

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).with_context(|| path.display().to_string())?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

fn read_headers(rdr: &mut csv::Reader<BufReader<File>>, path: &Path) -> Result<Vec<String>> {
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of '{}'", path.display()))?;
    Ok(headers.iter().map(String::from).collect())
}

/// Find a required column, or fail naming the file and the column.
fn require_column(headers: &[String], path: &Path, column: &str) -> Result<usize> {
    headers.iter().position(|h| h == column).with_context(|| {
        format!(
            "The input file '{}' must contain a column named '{column}', but it was not found. \
             Please check the headers in the file.",
            path.display()
        )
    })
}

fn parse_barcode(record: &StringRecord, col: usize, path: &Path, line: usize) -> Result<AliquotBarcode> {
    record[col].parse().with_context(|| {
        format!(
            "Error in '{}'. On line {line}: invalid sample barcode '{}'",
            path.display(),
            &record[col]
        )
    })
}

fn is_missing(cell: &str) -> bool {
    MISSING_CELLS.iter().any(|m| cell.eq_ignore_ascii_case(m))
}

/// Read a long-form assay table. Every column other than `barcode_column`
/// becomes a feature; empty, `NA`, and `NaN` cells become missing values.
pub fn read_assay_table(path: &Path, barcode_column: &str) -> Result<AssayTable> {
    let mut rdr = open_reader(path)?;
    let headers = read_headers(&mut rdr, path)?;
    let barcode_col = require_column(&headers, path, barcode_column)?;

    let feature_cols: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != barcode_col)
        .collect();
    if feature_cols.is_empty() {
        bail!(
            "The input file '{}' has no measurement columns besides '{barcode_column}'.",
            path.display()
        );
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let line = i + 2; // line 1 is the header
        let record = record.with_context(|| format!("reading '{}' line {line}", path.display()))?;
        let aliquot = parse_barcode(&record, barcode_col, path, line)?;
        for &(col, feature) in &feature_cols {
            let cell = &record[col];
            let value = if is_missing(cell) {
                None
            } else {
                Some(cell.parse::<f64>().with_context(|| {
                    format!(
                        "Error in '{}'. On line {line} in '{feature}' column: \
                         expected a number but received '{cell}'",
                        path.display()
                    )
                })?)
            };
            rows.push(AssayRow {
                aliquot: aliquot.clone(),
                feature: feature.clone(),
                value,
            });
        }
    }
    Ok(AssayTable::new(source_name(path), rows))
}

/// Read a categorical label table (e.g. immune subtype assignments). Rows
/// with an empty label cell are skipped with a warning; a label is a missing
/// measurement, not something to invent.
pub fn read_label_table(path: &Path, barcode_column: &str, label_column: &str) -> Result<LabelTable> {
    let mut rdr = open_reader(path)?;
    let headers = read_headers(&mut rdr, path)?;
    let barcode_col = require_column(&headers, path, barcode_column)?;
    let label_col = require_column(&headers, path, label_column)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (i, record) in rdr.records().enumerate() {
        let line = i + 2;
        let record = record.with_context(|| format!("reading '{}' line {line}", path.display()))?;
        let label = &record[label_col];
        if is_missing(label) {
            skipped += 1;
            continue;
        }
        rows.push(LabelRow {
            aliquot: parse_barcode(&record, barcode_col, path, line)?,
            label: label.to_string(),
        });
    }
    if skipped > 0 {
        log::warn!("{}: skipped {skipped} rows with no '{label_column}' label", path.display());
    }
    Ok(LabelTable::new(source_name(path), rows))
}

/// Read the quality-control table into an exclusion set. Requires boolean
/// columns `failed_pathology` and `do_not_use`.
pub fn read_exclusion_set(path: &Path, barcode_column: &str) -> Result<ExclusionSet> {
    let mut rdr = open_reader(path)?;
    let headers = read_headers(&mut rdr, path)?;
    let barcode_col = require_column(&headers, path, barcode_column)?;
    let pathology_col = require_column(&headers, path, "failed_pathology")?;
    let do_not_use_col = require_column(&headers, path, "do_not_use")?;

    let mut set = ExclusionSet::new();
    for (i, record) in rdr.records().enumerate() {
        let line = i + 2;
        let record = record.with_context(|| format!("reading '{}' line {line}", path.display()))?;
        let failed_pathology = parse_flag(&record[pathology_col], path, line, "failed_pathology")?;
        let do_not_use = parse_flag(&record[do_not_use_col], path, line, "do_not_use")?;
        if !(failed_pathology || do_not_use) {
            continue;
        }
        let aliquot = parse_barcode(&record, barcode_col, path, line)?;
        // do_not_use takes precedence when both flags are set.
        let reason = if do_not_use {
            ExclusionReason::DoNotUse
        } else {
            ExclusionReason::FailedPathology
        };
        set.insert(&aliquot, reason);
    }
    Ok(set)
}

fn parse_flag(cell: &str, path: &Path, line: usize, column: &str) -> Result<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        other => bail!(
            "Error in '{}'. On line {line} in '{column}' column: \
             expected a boolean flag but received '{other}'",
            path.display()
        ),
    }
}

/// Read the curated gene annotation. Requires `symbol` and `category`
/// columns; `hgnc_id` is optional.
pub fn read_feature_annotation(path: &Path) -> Result<FeatureAnnotationTable> {
    let mut rdr = open_reader(path)?;
    let headers = read_headers(&mut rdr, path)?;
    let symbol_col = require_column(&headers, path, "symbol")?;
    let category_col = require_column(&headers, path, "category")?;
    let hgnc_col = headers.iter().position(|h| h == "hgnc_id");

    let mut annotations = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let line = i + 2;
        let record = record.with_context(|| format!("reading '{}' line {line}", path.display()))?;
        let symbol = record[symbol_col].to_string();
        if symbol.is_empty() {
            bail!(
                "Error in '{}'. On line {line} in 'symbol' column: \
                 value required but cell is empty.",
                path.display()
            );
        }
        annotations.push(FeatureAnnotation {
            symbol,
            hgnc_id: hgnc_col
                .map(|c| record[c].to_string())
                .filter(|id| !id.is_empty()),
            category: record[category_col].to_string(),
        });
    }
    Ok(annotations.into_iter().collect())
}

/// Write a wide table as tab-delimited text, missing cells as `NA`.
pub fn write_wide_table(path: &Path, wide: &WideTable) -> Result<()> {
    let file = File::create(path).with_context(|| path.display().to_string())?;
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file));

    let mut header = vec!["aliquot_barcode".to_string()];
    header.extend(wide.features.iter().cloned());
    wtr.write_record(&header)?;

    for row in &wide.rows {
        let mut record = vec![row.aliquot.as_str().to_string()];
        record.extend(row.values.iter().map(|v| match v {
            Some(x) => x.to_string(),
            None => "NA".to_string(),
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_read_assay_table() {
        let f = write_tmp(
            "aliquot_barcode\tIDO1\tCD28\n\
             PROJ-AB-0001-01A-11D-1111-05\t5.5\tNA\n\
             PROJ-AB-0002-01A-11D-1111-05\t2.25\t0.5\n",
        );
        let table = read_assay_table(f.path(), "aliquot_barcode").unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.rows[0].feature, "IDO1");
        assert_eq!(table.rows[0].value, Some(5.5));
        assert_eq!(table.rows[1].feature, "CD28");
        assert_eq!(table.rows[1].value, None);
        assert_eq!(table.feature_names(), vec!["CD28", "IDO1"]);
    }

    #[test]
    fn test_read_assay_table_missing_column() {
        let f = write_tmp("sample\tIDO1\nPROJ-AB-0001-01A-11D-1111-05\t5.5\n");
        let err = read_assay_table(f.path(), "aliquot_barcode").unwrap_err();
        assert!(err.to_string().contains("aliquot_barcode"));
    }

    #[test]
    fn test_read_assay_table_bad_number_is_fatal() {
        let f = write_tmp(
            "aliquot_barcode\tIDO1\nPROJ-AB-0001-01A-11D-1111-05\tbogus\n",
        );
        assert!(read_assay_table(f.path(), "aliquot_barcode").is_err());
    }

    #[test]
    fn test_read_label_table_skips_missing_labels() {
        let f = write_tmp(
            "aliquot_barcode\tsubtype\n\
             PROJ-AB-0001-01A-11D-1111-05\tC3\n\
             PROJ-AB-0002-01A-11D-1111-05\tNA\n",
        );
        let table = read_label_table(f.path(), "aliquot_barcode", "subtype").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].label, "C3");
    }

    #[test]
    fn test_read_exclusion_set() {
        let f = write_tmp(
            "aliquot_barcode\tfailed_pathology\tdo_not_use\n\
             PROJ-AB-0001-01A-11D-1111-05\tTrue\tFalse\n\
             PROJ-AB-0002-01A-11D-1111-05\tFalse\tFalse\n\
             PROJ-AB-0003-01A-11D-1111-05\tTrue\tTrue\n",
        );
        let set = read_exclusion_set(f.path(), "aliquot_barcode").unwrap();
        assert_eq!(set.len(), 2);
        let flagged = AliquotBarcode::from("PROJ-AB-0003-01A-11D-1111-05");
        assert_eq!(set.reason(&flagged), Some(ExclusionReason::DoNotUse));
        let clean = AliquotBarcode::from("PROJ-AB-0002-01A-11D-1111-05");
        assert!(!set.contains(&clean));
    }

    #[test]
    fn test_read_exclusion_set_bad_flag() {
        let f = write_tmp(
            "aliquot_barcode\tfailed_pathology\tdo_not_use\n\
             PROJ-AB-0001-01A-11D-1111-05\tmaybe\tFalse\n",
        );
        assert!(read_exclusion_set(f.path(), "aliquot_barcode").is_err());
    }

    #[test]
    fn test_read_feature_annotation() {
        let f = write_tmp(
            "symbol\thgnc_id\tcategory\n\
             IDO1\tHGNC:6059\tInhibitory\n\
             CD28\t\tStimulatory\n",
        );
        let table = read_feature_annotation(f.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("IDO1").unwrap().hgnc_id.as_deref(), Some("HGNC:6059"));
        assert_eq!(table.get("CD28").unwrap().hgnc_id, None);
    }

    #[test]
    fn test_write_wide_table_round_trip_text() {
        use crate::table::WideRow;
        let wide = WideTable {
            source: "expr".to_string(),
            features: vec!["CD28".to_string(), "IDO1".to_string()],
            rows: vec![WideRow {
                aliquot: AliquotBarcode::from("PROJ-AB-0001-01A-11D-1111-05"),
                values: vec![Some(1.5), None],
            }],
        };
        let f = tempfile::NamedTempFile::new().unwrap();
        write_wide_table(f.path(), &wide).unwrap();
        let text = std::fs::read_to_string(f.path()).unwrap();
        assert_eq!(
            text,
            "aliquot_barcode\tCD28\tIDO1\n\
             PROJ-AB-0001-01A-11D-1111-05\t1.5\tNA\n"
        );
    }
}
