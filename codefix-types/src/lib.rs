//! Shared DTOs for the codefix workspace.
//!
//! # Design constraints
//! - Snapshots are values: every edit produces a new [`snapshot::ProjectSnapshot`].
//! - Diagnostics are immutable records; providers read them, never rewrite them.
//! - Report types are intended to be serialized to disk. Prefer adding optional
//!   fields over changing semantics.

pub mod diagnostic;
pub mod report;
pub mod snapshot;

pub use diagnostic::{AnalysisResult, Diagnostic, Location, ProjectId, Span, UnitId};
pub use snapshot::{Project, ProjectSnapshot, Unit};

/// Schema identifiers.
pub mod schema {
    pub const CODEFIX_REPORT_V1: &str = "codefix.report.v1";
    pub const CODEFIX_DIAGNOSTICS_V1: &str = "codefix.diagnostics.v1";
}
