//! Port traits abstracting all I/O away from the pipeline.

use camino::Utf8Path;
use codefix_types::{AnalysisResult, ProjectSnapshot};

/// Where the initial project snapshot comes from.
pub trait SnapshotSource {
    fn load_snapshot(&self) -> anyhow::Result<ProjectSnapshot>;
}

/// Diagnostics for a snapshot. Called once per pass with the pass's snapshot.
pub trait AnalysisSource {
    fn analyze(&self, snapshot: &ProjectSnapshot) -> anyhow::Result<AnalysisResult>;

    /// Whether `analyze` sees edits made by earlier passes. Sources that only
    /// know the loaded snapshot return `false`; their empty answer for a later
    /// pass says nothing about what is left.
    fn tracks_edits(&self) -> bool {
        true
    }
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
