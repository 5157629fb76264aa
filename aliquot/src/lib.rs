//! Crate for dealing with aliquot barcodes.
//!
//! An aliquot barcode is a structured, hyphen-delimited identifier encoding
//! the provenance of a physical specimen: project, tissue source, participant,
//! sample/vial, portion, and downstream analyte segments. Different data
//! sources emit the same barcodes with different separator characters, so all
//! parsing goes through a single normalizing constructor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/* ---------------------------------------------------------------------------------------------- */

/// The minimum number of hyphen-delimited segments in a well-formed barcode.
/// Anything shorter cannot carry a vial-level prefix and is rejected rather
/// than truncated.
pub const MIN_SEGMENTS: usize = 5;

/// The number of trailing segments (portion/analyte, plate, center) that are
/// stripped to obtain the vial id.
pub const VIAL_SUFFIX_SEGMENTS: usize = 3;

/// The number of leading segments that form the portion id.
pub const PORTION_PREFIX_SEGMENTS: usize = 5;

/* ---------------------------------------------------------------------------------------------- */

/// Errors produced when validating a raw barcode string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliquotError {
    #[error(
        "malformed aliquot barcode '{barcode}': expected at least {MIN_SEGMENTS} \
         hyphen-delimited segments, found {segments}"
    )]
    MalformedIdentifier { barcode: String, segments: usize },

    #[error("malformed aliquot barcode '{barcode}': segment {index} is empty")]
    EmptySegment { barcode: String, index: usize },
}

/* ---------------------------------------------------------------------------------------------- */

/// A validated, normalized aliquot barcode.
///
/// The stored form uses `-` as the only separator; raw input using `.` is
/// normalized on construction. Two barcodes refer to the same biological vial
/// when their [vial ids](AliquotBarcode::vial_id) match, and to the same
/// physical portion/plate when their [portion ids](AliquotBarcode::portion_id)
/// match.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct AliquotBarcode {
    normalized: String,
    segments: usize,
}

impl AliquotBarcode {
    /// Parse and normalize a raw barcode string.
    ///
    /// `.` separators are replaced with `-` before segment validation, so
    /// `A.B.0001.01C.01D.0182.01` and `A-B-0001-01C-01D-0182-01` produce the
    /// same barcode.
    pub fn parse(raw: &str) -> Result<AliquotBarcode, AliquotError> {
        let normalized = raw.replace('.', "-");
        let segments = normalized.split('-').count();
        if segments < MIN_SEGMENTS {
            return Err(AliquotError::MalformedIdentifier {
                barcode: raw.to_string(),
                segments,
            });
        }
        if let Some((index, _)) = normalized
            .split('-')
            .enumerate()
            .find(|(_, seg)| seg.is_empty())
        {
            return Err(AliquotError::EmptySegment {
                barcode: raw.to_string(),
                index,
            });
        }
        Ok(AliquotBarcode {
            normalized,
            segments,
        })
    }

    /// The normalized barcode string.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Number of hyphen-delimited segments.
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// The vial id: every segment except the trailing three.
    ///
    /// All aliquots derived from the same physical specimen vial share this
    /// prefix, regardless of portion, plate or analyte.
    pub fn vial_id(&self) -> &str {
        let nth = self.segments - VIAL_SUFFIX_SEGMENTS - 1;
        let (end, _) = self
            .normalized
            .match_indices('-')
            .nth(nth)
            .expect("validated barcode has enough segments");
        &self.normalized[..end]
    }

    /// The portion id: the first five segments.
    ///
    /// Distinguishes physical portions/plates derived from the same vial; a
    /// vial-id match alone is not evidence that two assays measured the same
    /// material.
    pub fn portion_id(&self) -> &str {
        match self.normalized.match_indices('-').nth(PORTION_PREFIX_SEGMENTS - 1) {
            Some((end, _)) => &self.normalized[..end],
            None => &self.normalized,
        }
    }

    /// True if `other` was derived from the same specimen vial.
    pub fn same_vial(&self, other: &AliquotBarcode) -> bool {
        self.vial_id() == other.vial_id()
    }

    /// True if `other` was derived from the same physical portion/plate.
    pub fn same_portion(&self, other: &AliquotBarcode) -> bool {
        self.portion_id() == other.portion_id()
    }
}

impl fmt::Display for AliquotBarcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl FromStr for AliquotBarcode {
    type Err = AliquotError;

    fn from_str(raw: &str) -> Result<AliquotBarcode, AliquotError> {
        AliquotBarcode::parse(raw)
    }
}

impl From<&str> for AliquotBarcode {
    /// Parse a barcode from its string representation, and panic if it fails.
    fn from(raw: &str) -> Self {
        raw.parse().unwrap()
    }
}

impl Serialize for AliquotBarcode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized)
    }
}

impl<'de> Deserialize<'de> for AliquotBarcode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Serialize and deserialize an `AliquotBarcode` as its normalized string, for
/// use with `#[serde(with = "aliquot_string")]`.
pub mod aliquot_string {
    use crate::AliquotBarcode;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Deserialize a barcode from its string representation.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<AliquotBarcode, D::Error> {
        <&str>::deserialize(deserializer)?
            .parse()
            .map_err(D::Error::custom)
    }

    /// Serialize a barcode to its normalized string representation.
    pub fn serialize<S: Serializer>(
        barcode: &AliquotBarcode,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(barcode)
    }
}

/// A trait for row types that carry an aliquot barcode, allowing joins and
/// filters to be written once over any assay table row.
pub trait HasAliquot {
    fn aliquot(&self) -> &AliquotBarcode;
}

impl HasAliquot for AliquotBarcode {
    fn aliquot(&self) -> &AliquotBarcode {
        self
    }
}
