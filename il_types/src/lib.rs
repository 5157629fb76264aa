//! Shared data model for immune-landscape cohort analysis.
//!
//! Defines the long- and wide-form assay tables that every pipeline stage
//! consumes and produces, the quality-control exclusion set applied to each
//! table immediately after load, the curated feature annotation table, and
//! the delimited-file adapters at the collaborator boundary.
//!
//! All table transformations are pure: each produces a new table and leaves
//! its inputs untouched.

pub mod annotation;
pub mod exclude;
pub mod hasher;
pub mod table;
pub mod tsv;

pub use annotation::{FeatureAnnotation, FeatureAnnotationTable};
pub use exclude::{ExclusionReason, ExclusionSet};
pub use hasher::{DetHashMap, DetHashSet, DetHasher};
pub use table::{AssayRow, AssayTable, LabelRow, LabelTable, WideRow, WideTable};
