//! Default filesystem-backed and in-memory port implementations.

use crate::ports::{AnalysisSource, SnapshotSource, WritePort};
use crate::settings::ProjectSpec;
use anyhow::{Context, anyhow, bail};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use codefix_types::schema::CODEFIX_DIAGNOSTICS_V1;
use codefix_types::{
    AnalysisResult, Diagnostic, Project, ProjectId, ProjectSnapshot, Span, Unit, UnitId,
};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Loads every project's files matching its include globs.
///
/// Unit ids are derived from `(project, relative path)`, so the same tree
/// always loads to the same ids. Dot-prefixed entries are only matched by
/// patterns that name them explicitly; files that are not UTF-8 are skipped.
#[derive(Debug, Clone)]
pub struct FsSnapshotSource {
    pub projects: Vec<ProjectSpec>,
}

impl FsSnapshotSource {
    pub fn new(projects: Vec<ProjectSpec>) -> Self {
        Self { projects }
    }

    /// glob reports `./a/b` as `a/b`, so roots are matched without `.` components.
    fn without_cur_dir(path: &Utf8Path) -> Utf8PathBuf {
        path.components()
            .filter(|c| !matches!(c, Utf8Component::CurDir))
            .collect()
    }

    fn matching_files(
        spec: &ProjectSpec,
        root: &Utf8Path,
    ) -> anyhow::Result<BTreeSet<Utf8PathBuf>> {
        let options = glob::MatchOptions {
            require_literal_leading_dot: true,
            ..glob::MatchOptions::new()
        };
        let mut files = BTreeSet::new();
        for pattern in &spec.include {
            let full = root.join(pattern);
            let matches = glob::glob_with(full.as_str(), options)
                .with_context(|| format!("invalid include pattern {pattern:?}"))?;
            for entry in matches {
                let path = entry.with_context(|| format!("walk {}", spec.root))?;
                if !path.is_file() {
                    continue;
                }
                let path = Utf8PathBuf::from_path_buf(path)
                    .map_err(|p| anyhow!("non-UTF-8 path {}", p.display()))?;
                files.insert(path);
            }
        }
        Ok(files)
    }
}

impl SnapshotSource for FsSnapshotSource {
    fn load_snapshot(&self) -> anyhow::Result<ProjectSnapshot> {
        let mut projects = BTreeMap::new();
        let mut units = Vec::new();

        for spec in &self.projects {
            let id = ProjectId::new(&spec.name);
            if projects.contains_key(&id) {
                bail!("project {} is configured more than once", spec.name);
            }

            let root = Self::without_cur_dir(&spec.root);
            for path in Self::matching_files(spec, &root)? {
                let rel = path
                    .strip_prefix(&root)
                    .map(Utf8Path::to_path_buf)
                    .unwrap_or_else(|_| path.clone());
                let text = match fs::read_to_string(&path) {
                    Ok(text) => text,
                    Err(err) if err.kind() == ErrorKind::InvalidData => {
                        debug!(path = %path, "skipping non-UTF-8 file");
                        continue;
                    }
                    Err(err) => return Err(err).with_context(|| format!("read {path}")),
                };
                let unit_id = UnitId::derived(&id, rel.as_str());
                units.push(Unit::new(unit_id, id.clone(), text).with_path(rel));
            }

            projects.insert(
                id.clone(),
                Project {
                    id,
                    root: Some(spec.root.clone()),
                },
            );
        }

        info!(projects = projects.len(), units = units.len(), "loaded snapshot");
        Ok(ProjectSnapshot::new(projects.into_values(), units))
    }
}

/// Snapshot supplied by the caller.
#[derive(Debug, Clone)]
pub struct InMemorySnapshotSource {
    snapshot: ProjectSnapshot,
}

impl InMemorySnapshotSource {
    pub fn new(snapshot: ProjectSnapshot) -> Self {
        Self { snapshot }
    }
}

impl SnapshotSource for InMemorySnapshotSource {
    fn load_snapshot(&self) -> anyhow::Result<ProjectSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Diagnostics file as produced by an external analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// One diagnostic addressed by `(project, path)` rather than by unit id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub category: String,
    pub project: String,
    pub path: Utf8PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl DiagnosticRecord {
    /// Located diagnostic, or a location-less one when the unit is unknown.
    fn resolve(&self, snapshot: &ProjectSnapshot) -> Diagnostic {
        let project = ProjectId::new(&self.project);
        let path = Utf8PathBuf::from(self.path.as_str().replace('\\', "/"));
        let location = match (snapshot.unit_by_path(&project, &path), self.span) {
            (Some(unit), Some(span)) => Some(codefix_types::Location {
                unit: unit.id,
                project: project.clone(),
                span,
            }),
            (None, _) => {
                debug!(project = %project, path = %path, "diagnostic for unknown unit");
                None
            }
            (Some(_), None) => None,
        };
        Diagnostic {
            category: self.category.clone(),
            location,
            message: self.message.clone(),
            properties: self.properties.clone(),
        }
    }
}

/// Answers only for the first snapshot version it sees.
///
/// Fixed diagnostics describe the snapshot they were computed from; after
/// edits their spans no longer line up, so later passes get nothing.
#[derive(Debug, Default)]
struct FirstVersionOnly(Mutex<Option<u64>>);

impl FirstVersionOnly {
    fn admits(&self, version: u64) -> bool {
        let mut first = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *first.get_or_insert(version) == version
    }
}

/// Reads diagnostics from a JSON file and resolves them against the snapshot.
#[derive(Debug)]
pub struct JsonAnalysisSource {
    path: Utf8PathBuf,
    gate: FirstVersionOnly,
}

impl JsonAnalysisSource {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: FirstVersionOnly::default(),
        }
    }

    fn load(&self) -> anyhow::Result<DiagnosticsFile> {
        let raw = fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path))?;
        let file: DiagnosticsFile =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", self.path))?;
        if let Some(schema) = file.schema.as_deref()
            && schema != CODEFIX_DIAGNOSTICS_V1
        {
            warn!(path = %self.path, schema, "unexpected diagnostics schema");
        }
        Ok(file)
    }
}

impl AnalysisSource for JsonAnalysisSource {
    fn analyze(&self, snapshot: &ProjectSnapshot) -> anyhow::Result<AnalysisResult> {
        if !self.gate.admits(snapshot.version()) {
            debug!(version = snapshot.version(), "no fresh diagnostics for edited snapshot");
            return Ok(AnalysisResult::new());
        }
        let file = self.load()?;
        let total = file.diagnostics.len();
        let analysis = AnalysisResult::from_diagnostics(
            file.diagnostics.iter().map(|r| r.resolve(snapshot)),
        );
        if analysis.len() < total {
            warn!(
                path = %self.path,
                dropped = total - analysis.len(),
                "some diagnostics did not resolve to a unit"
            );
        }
        Ok(analysis)
    }

    fn tracks_edits(&self) -> bool {
        false
    }
}

type AnalyzeFn = Box<dyn Fn(&ProjectSnapshot) -> AnalysisResult + Send + Sync>;

enum InMemoryAnalysis {
    Fixed(AnalysisResult, FirstVersionOnly),
    Live(AnalyzeFn),
}

/// Analysis supplied by the caller, either fixed or recomputed per pass.
pub struct InMemoryAnalysisSource {
    inner: InMemoryAnalysis,
}

impl InMemoryAnalysisSource {
    /// Precomputed diagnostics; like the JSON source, only for the first snapshot seen.
    pub fn new(analysis: AnalysisResult) -> Self {
        Self {
            inner: InMemoryAnalysis::Fixed(analysis, FirstVersionOnly::default()),
        }
    }

    /// Re-analyzes every snapshot it is asked about.
    pub fn from_fn(
        analyze: impl Fn(&ProjectSnapshot) -> AnalysisResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: InMemoryAnalysis::Live(Box::new(analyze)),
        }
    }
}

impl AnalysisSource for InMemoryAnalysisSource {
    fn analyze(&self, snapshot: &ProjectSnapshot) -> anyhow::Result<AnalysisResult> {
        match &self.inner {
            InMemoryAnalysis::Fixed(analysis, gate) if gate.admits(snapshot.version()) => {
                Ok(analysis.clone())
            }
            InMemoryAnalysis::Fixed(..) => Ok(AnalysisResult::new()),
            InMemoryAnalysis::Live(analyze) => Ok(analyze(snapshot)),
        }
    }

    fn tracks_edits(&self) -> bool {
        matches!(self.inner, InMemoryAnalysis::Live(_))
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}
