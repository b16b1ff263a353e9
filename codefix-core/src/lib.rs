//! Embeddable core library for codefix.
//!
//! Provides a clap-free, I/O-abstracted entry point suitable for linking
//! into an editor host or other process.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`SnapshotSource`](ports::SnapshotSource): load the project snapshot
//! - [`AnalysisSource`](ports::AnalysisSource): diagnostics for a snapshot
//! - [`WritePort`](ports::WritePort): write files and create directories
//!
//! The [`adapters`] module provides filesystem-backed and in-memory implementations.
//!
//! # Entry points
//!
//! - [`run_fix`](pipeline::run_fix): run passes until converged or the pass limit
//! - [`write_fix_artifacts`](pipeline::write_fix_artifacts): persist the report and patch
//! - [`apply_changes`](pipeline::apply_changes): write changed units back to disk

pub mod adapters;
pub mod pipeline;
pub mod ports;
pub mod settings;
pub mod store;

// Re-export the provider seam so embedders don't need codefix-domain directly.
pub use codefix_domain::{
    CancelFlag, Cancellation, FallbackPolicy, FallbackRule, FixProvider, NeverCancel,
    builtin_providers,
};
