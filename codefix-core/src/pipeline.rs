//! Multi-pass fix pipeline, extracted from the CLI.
//!
//! These entry points are I/O-agnostic: loading, analysis and writing are
//! performed through the port traits.

use crate::ports::{AnalysisSource, SnapshotSource, WritePort};
use crate::settings::FixSettings;
use crate::store::{SharedSnapshot, SnapshotConflict};
use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use codefix_domain::{
    Cancellation, CategorySummary, Engine, EngineError, FixProvider, OptionHostServices,
};
use codefix_types::report::{FixReport, ReportEntry, ToolInfo};
use codefix_types::{AnalysisResult, ProjectSnapshot};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error type for pipeline results. Every variant maps to exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    SnapshotConflict(#[from] SnapshotConflict),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<EngineError> for ToolError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Cancelled => ToolError::Cancelled,
        }
    }
}

/// Outcome of `run_fix`.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// Snapshot as loaded, before any pass.
    pub original: ProjectSnapshot,
    /// Snapshot after the last pass.
    pub snapshot: ProjectSnapshot,
    pub report: FixReport,
    /// Unified diff from `original` to `snapshot`.
    pub patch: String,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        !self.report.changed_units.is_empty()
    }
}

/// Run passes until no category asks for another one, or `max_passes` is hit.
///
/// Each pass re-analyzes the current snapshot, runs every (category, provider)
/// pair whose category has diagnostics, and commits the result to the shared
/// store. The caller is responsible for writing artifacts (`write_fix_artifacts`)
/// and, when wanted, the changed units (`apply_changes`).
pub fn run_fix(
    settings: &FixSettings,
    snapshots: &dyn SnapshotSource,
    analysis: &dyn AnalysisSource,
    providers: &[Box<dyn FixProvider>],
    cancel: &dyn Cancellation,
    tool: ToolInfo,
) -> Result<FixOutcome, ToolError> {
    if settings.max_passes == 0 {
        return Err(anyhow!("max_passes must be at least 1").into());
    }

    let engine = Engine::new(settings.policy.clone())
        .with_host(Arc::new(OptionHostServices::new(settings.params.clone())))
        .with_lock(settings.lock.clone());

    let original = snapshots.load_snapshot().context("load project snapshot")?;
    let store = SharedSnapshot::new(original.clone());
    let mut report = FixReport::new(tool);
    let started = report.run.started_at;
    let mut pending = false;

    for pass in 1..=settings.max_passes {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let current = store.current();
        let diagnostics = analysis
            .analyze(&current)
            .with_context(|| format!("analyze snapshot for pass {pass}"))?;
        let pairs = pairs_for(providers, &diagnostics);
        if pairs.is_empty() {
            if pending && !analysis.tracks_edits() {
                report.converged = false;
                warn!(
                    pass,
                    "analysis source cannot re-analyze edited snapshots; diagnostics may remain"
                );
            } else {
                debug!(pass, "no diagnostics with a provider; done");
            }
            break;
        }

        let outcome = engine.run_pass(&current, &diagnostics, pairs.iter().copied(), cancel)?;
        report.passes = pass;
        report
            .entries
            .extend(outcome.results.iter().map(|r| report_entry(pass, r)));
        info!(
            pass,
            categories = outcome.results.len(),
            changed = outcome.changed(),
            needs_another_pass = outcome.needs_another_pass,
            "pass complete"
        );

        store.commit(current.version(), outcome.snapshot)?;
        pending = outcome.needs_another_pass;
        if !pending {
            break;
        }
        if pass == settings.max_passes {
            report.converged = false;
            warn!(max_passes = settings.max_passes, "pass limit reached before convergence");
        }
    }

    let snapshot = Arc::unwrap_or_clone(store.into_inner());
    report.changed_units = codefix_edit::changed_units(&original, &snapshot);
    let ended = Utc::now();
    report.run.ended_at = Some(ended);
    report.run.duration_ms = u64::try_from((ended - started).num_milliseconds()).ok();
    report.summarize();

    let patch = codefix_edit::render_patch(&original, &snapshot);
    Ok(FixOutcome {
        original,
        snapshot,
        report,
        patch,
    })
}

/// Every (category, provider) pair whose category has diagnostics, in provider order.
fn pairs_for<'p>(
    providers: &'p [Box<dyn FixProvider>],
    analysis: &AnalysisResult,
) -> Vec<(&'p str, &'p dyn FixProvider)> {
    let present = analysis.categories();
    let mut pairs = Vec::new();
    for provider in providers {
        for category in provider.categories() {
            if present.contains(category) {
                pairs.push((*category, provider.as_ref()));
            }
        }
    }
    for category in present {
        if !pairs.iter().any(|(c, _)| *c == category) {
            debug!(category, "no provider for category");
        }
    }
    pairs
}

fn report_entry(pass: u32, summary: &CategorySummary) -> ReportEntry {
    ReportEntry {
        pass,
        category: summary.category.clone(),
        provider: summary.provider.clone(),
        strategy: summary.strategy,
        status: summary.outcome.status(),
        reason: summary.outcome.reason().map(ToString::to_string),
        applied: summary.applied,
        failed: summary.failed,
        needs_another_pass: summary.needs_another_pass,
    }
}

/// Write `report.json` and `patch.diff` to the output directory.
pub fn write_fix_artifacts(
    outcome: &FixOutcome,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;

    let report_json = serde_json::to_string_pretty(&outcome.report).context("serialize report")?;
    writer.write_file(&out_dir.join("report.json"), report_json.as_bytes())?;
    writer.write_file(&out_dir.join("patch.diff"), outcome.patch.as_bytes())?;

    info!(out_dir = %out_dir, "wrote artifacts");
    Ok(())
}

/// Write every changed unit back to `<project root>/<path>`.
///
/// Units without a path, or in projects without a root, have nowhere to go
/// and are skipped. Returns the paths written.
pub fn apply_changes(
    outcome: &FixOutcome,
    writer: &dyn WritePort,
) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut written = Vec::new();
    for id in outcome.original.changed_units(&outcome.snapshot) {
        let Some(unit) = outcome.snapshot.unit(&id) else {
            continue;
        };
        let root = outcome
            .snapshot
            .project(&unit.project)
            .and_then(|p| p.root.as_ref());
        let (Some(root), Some(rel)) = (root, unit.path.as_ref()) else {
            debug!(unit = %unit.display_name(), "changed unit has no file; not written");
            continue;
        };
        let path = root.join(rel);
        writer
            .write_file(&path, unit.text.as_bytes())
            .with_context(|| format!("apply changes to {}", unit.display_name()))?;
        written.push(path);
    }
    info!(files = written.len(), "applied changes");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryAnalysisSource, InMemorySnapshotSource};
    use codefix_domain::{CancelFlag, CodeAction, FixContext, NeverCancel, builtin_providers};
    use codefix_types::report::{EntryStatus, StrategyKind};
    use codefix_types::{Diagnostic, Project, ProjectId, Span, Unit, UnitId};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemWritePort {
        files: Mutex<HashMap<String, Vec<u8>>>,
        dirs: Mutex<Vec<String>>,
    }

    impl WritePort for MemWritePort {
        fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
            let key = path.as_str().replace('\\', "/");
            self.files
                .lock()
                .expect("lock files")
                .insert(key, contents.to_vec());
            Ok(())
        }

        fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
            let key = path.as_str().replace('\\', "/");
            self.dirs.lock().expect("lock dirs").push(key);
            Ok(())
        }
    }

    fn tool() -> ToolInfo {
        ToolInfo {
            name: "codefix".into(),
            version: Some("0.0.0-test".into()),
        }
    }

    fn fixture(text: &str) -> (ProjectId, UnitId, ProjectSnapshot) {
        let p = ProjectId::new("app");
        let id = UnitId::derived(&p, "src/a.cs");
        let project = Project {
            id: p.clone(),
            root: Some(Utf8PathBuf::from("/repo/app")),
        };
        let unit = Unit::new(id, p.clone(), text).with_path("src/a.cs");
        (p, id, ProjectSnapshot::new([project], [unit]))
    }

    fn trailing_whitespace(snapshot: &ProjectSnapshot) -> AnalysisResult {
        let mut analysis = AnalysisResult::new();
        for unit in snapshot.units() {
            let mut offset = 0;
            for line in unit.text.split_inclusive('\n') {
                let body = line.trim_end_matches('\n');
                let trimmed = body.trim_end_matches([' ', '\t']);
                if trimmed.len() < body.len() {
                    analysis.push(Diagnostic::at(
                        "whitespace.trailing",
                        &unit.project,
                        unit.id,
                        Span::new(offset + trimmed.len(), offset + body.len()),
                    ));
                }
                offset += line.len();
            }
        }
        analysis
    }

    #[test]
    fn run_fix_converges_and_reports() {
        let (_, id, snapshot) = fixture("a  \nb\t\nc\n");
        let outcome = run_fix(
            &FixSettings::default(),
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::from_fn(trailing_whitespace),
            &builtin_providers(),
            &NeverCancel,
            tool(),
        )
        .expect("run_fix");

        assert_eq!(outcome.snapshot.unit(&id).expect("unit").text, "a\nb\nc\n");
        assert_eq!(outcome.original.unit(&id).expect("unit").text, "a  \nb\t\nc\n");
        assert!(outcome.report.converged);
        // Pass 2 finds nothing left to fix.
        assert_eq!(outcome.report.passes, 1);
        assert_eq!(outcome.report.entries.len(), 1);
        assert_eq!(outcome.report.entries[0].strategy, StrategyKind::Batch);
        assert_eq!(outcome.report.entries[0].status, EntryStatus::Applied);
        assert_eq!(outcome.report.summary.units_changed, 1);
        assert!(outcome.patch.contains("--- a/app/src/a.cs"));
        assert!(outcome.patch.contains("-a  "));
    }

    /// Fails the first time it sees each span, so every diagnostic needs a retry.
    #[derive(Default)]
    struct Flaky {
        seen: Mutex<Vec<(UnitId, Span)>>,
    }

    impl FixProvider for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn categories(&self) -> &[&str] {
            &["naming"]
        }

        fn register_fixes(&self, ctx: &FixContext<'_>) -> anyhow::Result<Vec<CodeAction>> {
            let span = ctx.diagnostic.span().ok_or_else(|| anyhow!("no span"))?;
            let key = (ctx.unit.id, span);
            let mut seen = self.seen.lock().expect("seen");
            let first_time = !seen.contains(&key);
            seen.push(key);
            if first_time && span.start > 0 {
                anyhow::bail!("not yet");
            }
            let text = ctx.unit.text_at(span).unwrap_or_default().to_uppercase();
            let next = codefix_edit::edit_unit(
                ctx.snapshot,
                &ctx.unit.id,
                &[codefix_edit::TextEdit::new(span, text)],
            )?;
            Ok(vec![CodeAction::apply_snapshot("upper", next)])
        }
    }

    fn lowercase_words(snapshot: &ProjectSnapshot) -> AnalysisResult {
        let mut analysis = AnalysisResult::new();
        for unit in snapshot.units() {
            let mut offset = 0;
            for word in unit.text.split(' ') {
                if word.chars().any(|c| c.is_lowercase()) {
                    analysis.push(
                        Diagnostic::at(
                            "naming",
                            &unit.project,
                            unit.id,
                            Span::new(offset, offset + word.len()),
                        )
                        .with_property("private_field", "true"),
                    );
                }
                offset += word.len() + 1;
            }
        }
        analysis
    }

    #[test]
    fn run_fix_reruns_passes_while_progress_is_made() {
        let (_, id, snapshot) = fixture("ab cd");
        let providers: Vec<Box<dyn FixProvider>> = vec![Box::new(Flaky::default())];
        let outcome = run_fix(
            &FixSettings::default(),
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::from_fn(lowercase_words),
            &providers,
            &NeverCancel,
            tool(),
        )
        .expect("run_fix");

        assert_eq!(outcome.snapshot.unit(&id).expect("unit").text, "AB CD");
        let passes: Vec<(u32, u64, u64, bool)> = outcome
            .report
            .entries
            .iter()
            .map(|e| (e.pass, e.applied, e.failed, e.needs_another_pass))
            .collect();
        assert_eq!(passes, vec![(1, 1, 1, true), (2, 1, 0, false)]);
        assert!(outcome.report.converged);
        assert_eq!(outcome.report.summary.failed_diagnostics, 1);
    }

    #[test]
    fn run_fix_stops_at_pass_limit() {
        let (_, _, snapshot) = fixture("ab cd");
        let providers: Vec<Box<dyn FixProvider>> = vec![Box::new(Flaky::default())];
        let settings = FixSettings {
            max_passes: 1,
            ..FixSettings::default()
        };
        let outcome = run_fix(
            &settings,
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::from_fn(lowercase_words),
            &providers,
            &NeverCancel,
            tool(),
        )
        .expect("run_fix");

        assert_eq!(outcome.report.passes, 1);
        assert!(!outcome.report.converged);
    }

    #[test]
    fn run_fix_with_fixed_analysis_reports_unfinished_retries() {
        let (_, id, snapshot) = fixture("ab cd");
        let analysis = lowercase_words(&snapshot);
        let providers: Vec<Box<dyn FixProvider>> = vec![Box::new(Flaky::default())];
        let outcome = run_fix(
            &FixSettings::default(),
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::new(analysis),
            &providers,
            &NeverCancel,
            tool(),
        )
        .expect("run_fix");

        // Pass 2 gets no fresh diagnostics, so the failed one is never retried.
        assert_eq!(outcome.snapshot.unit(&id).expect("unit").text, "AB cd");
        assert_eq!(outcome.report.passes, 1);
        assert!(!outcome.report.converged);
    }

    #[test]
    fn run_fix_rejects_zero_passes() {
        let (_, _, snapshot) = fixture("x");
        let settings = FixSettings {
            max_passes: 0,
            ..FixSettings::default()
        };
        let err = run_fix(
            &settings,
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::new(AnalysisResult::new()),
            &builtin_providers(),
            &NeverCancel,
            tool(),
        )
        .expect_err("zero passes");
        assert!(matches!(err, ToolError::Internal(_)));
    }

    #[test]
    fn run_fix_surfaces_cancellation() {
        let (_, _, snapshot) = fixture("a  \n");
        let flag = CancelFlag::new();
        flag.cancel();
        let err = run_fix(
            &FixSettings::default(),
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::from_fn(trailing_whitespace),
            &builtin_providers(),
            &flag,
            tool(),
        )
        .expect_err("cancelled");
        assert!(matches!(err, ToolError::Cancelled));
    }

    #[test]
    fn params_reach_providers_as_host_options() {
        let (p, id, snapshot) = fixture("int value;");
        let analysis = AnalysisResult::from_diagnostics(vec![
            Diagnostic::at("naming", &p, id, Span::new(4, 9))
                .with_property("private_field", "true"),
        ]);
        let settings = FixSettings {
            params: [("naming.private_field_prefix".to_string(), "m_".to_string())].into(),
            ..FixSettings::default()
        };
        let outcome = run_fix(
            &settings,
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::new(analysis),
            &builtin_providers(),
            &NeverCancel,
            tool(),
        )
        .expect("run_fix");
        assert_eq!(outcome.snapshot.unit(&id).expect("unit").text, "int m_value;");
    }

    #[test]
    fn artifacts_and_applied_units_are_written() {
        let (_, _, snapshot) = fixture("a  \n");
        let outcome = run_fix(
            &FixSettings::default(),
            &InMemorySnapshotSource::new(snapshot),
            &InMemoryAnalysisSource::from_fn(trailing_whitespace),
            &builtin_providers(),
            &NeverCancel,
            tool(),
        )
        .expect("run_fix");

        let writer = MemWritePort::default();
        write_fix_artifacts(&outcome, Utf8Path::new("out"), &writer).expect("artifacts");
        let written = apply_changes(&outcome, &writer).expect("apply");
        assert_eq!(written, vec![Utf8PathBuf::from("/repo/app/src/a.cs")]);

        let files = writer.files.lock().expect("files");
        let report: serde_json::Value =
            serde_json::from_slice(&files["out/report.json"]).expect("report json");
        assert_eq!(report["schema"], "codefix.report.v1");
        assert_eq!(report["summary"]["units_changed"], 1);
        assert!(files.contains_key("out/patch.diff"));
        assert_eq!(files["/repo/app/src/a.cs"], b"a\n".to_vec());
        assert_eq!(*writer.dirs.lock().expect("dirs"), vec!["out".to_string()]);
    }
}
