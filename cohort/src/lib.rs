//! Sample-set matching and long/wide aggregation.
//!
//! The two middle stages of the reconciliation pipeline: joining assay tables
//! on vial id with a byte-equal portion-id guard, and collapsing long-form
//! replicates into a deterministic wide table.

pub mod aggregate;
pub mod matcher;

pub use aggregate::{aggregate, wide_to_long, CohortError, MissingPolicy};
pub use matcher::{match_rows, JoinAudit, MatchedCohort, PortionMismatch};
