use crate::diagnostic::{ProjectId, UnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Machine-readable summary of one `codefix` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunInfo,

    /// Number of passes that were executed.
    pub passes: u32,

    /// False when the pass limit was reached while a pass still asked for another.
    pub converged: bool,

    #[serde(default)]
    pub entries: Vec<ReportEntry>,

    #[serde(default)]
    pub changed_units: Vec<ChangedUnit>,

    pub summary: ReportSummary,
}

impl FixReport {
    pub fn new(tool: ToolInfo) -> Self {
        Self {
            schema: crate::schema::CODEFIX_REPORT_V1.to_string(),
            tool,
            run: RunInfo {
                started_at: Utc::now(),
                ended_at: None,
                duration_ms: None,
            },
            passes: 0,
            converged: true,
            entries: vec![],
            changed_units: vec![],
            summary: ReportSummary::default(),
        }
    }

    /// Recomputes `summary` from `entries` and `changed_units`.
    pub fn summarize(&mut self) {
        let mut summary = ReportSummary {
            units_changed: self.changed_units.len() as u64,
            ..ReportSummary::default()
        };
        for e in &self.entries {
            match e.status {
                EntryStatus::Applied => summary.applied += 1,
                EntryStatus::NoChange => summary.no_change += 1,
                EntryStatus::Skipped => summary.skipped += 1,
            }
            summary.failed_diagnostics += e.failed;
        }
        self.summary = summary;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// How a category was (or was not) applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Batch,
    Fallback,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// The snapshot changed.
    Applied,
    /// The strategy ran but produced no change.
    NoChange,
    /// The category was skipped with a reason.
    Skipped,
}

/// One (pass, category, provider) invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub pass: u32,
    pub category: String,
    pub provider: String,
    pub strategy: StrategyKind,
    pub status: EntryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default)]
    pub applied: u64,

    #[serde(default)]
    pub failed: u64,

    #[serde(default)]
    pub needs_another_pass: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedUnit {
    pub unit: UnitId,
    pub project: ProjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    pub before_sha256: String,
    pub after_sha256: String,
    pub before_bytes: u64,
    pub after_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub applied: u64,
    pub no_change: u64,
    pub skipped: u64,
    pub failed_diagnostics: u64,
    pub units_changed: u64,
}
