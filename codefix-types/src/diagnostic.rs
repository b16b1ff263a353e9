use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of a project inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a unit (source file).
///
/// Units are never identified by path: generated content has no path and two
/// projects may link the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub Uuid);

impl UnitId {
    /// Namespace for ids derived from `(project, relative path)`.
    const NAMESPACE: Uuid = Uuid::from_u128(0x6c0d_ef1c_5a3e_4b8f_9d2a_c0de_f1c5_0001);

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id for a file loaded from disk.
    pub fn derived(project: &ProjectId, rel_path: &str) -> Self {
        let name = format!("{}/{}", project.as_str(), rel_path.replace('\\', "/"));
        Self(Uuid::new_v5(&Self::NAMESPACE, name.as_bytes()))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Half-open byte range `[start, end)` within a unit's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{})", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub unit: UnitId,
    pub project: ProjectId,
    pub span: Span,
}

/// A detected issue. Immutable once produced by analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Category (rule) id, e.g. `"naming"`.
    pub category: String,

    /// `None` for location-less diagnostics, which never take part in fixing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Provider-specific classification flags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Diagnostic {
    pub fn new(category: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            category: category.into(),
            location,
            message: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn at(category: impl Into<String>, project: &ProjectId, unit: UnitId, span: Span) -> Self {
        Self::new(
            category,
            Some(Location {
                unit,
                project: project.clone(),
                span,
            }),
        )
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn unit(&self) -> Option<UnitId> {
        self.location.as_ref().map(|l| l.unit)
    }

    pub fn span(&self) -> Option<Span> {
        self.location.as_ref().map(|l| l.span)
    }
}

/// Diagnostics partitioned by owning project.
///
/// Every located diagnostic lives under exactly one project key; location-less
/// diagnostics are dropped at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    by_project: BTreeMap<ProjectId, Vec<Diagnostic>>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_diagnostics(diagnostics: impl IntoIterator<Item = Diagnostic>) -> Self {
        let mut out = Self::new();
        for d in diagnostics {
            out.push(d);
        }
        out
    }

    /// Adds a diagnostic under its location's project. Returns false (and drops
    /// the diagnostic) when it has no location.
    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        let Some(project) = diagnostic.location.as_ref().map(|l| l.project.clone()) else {
            return false;
        };
        self.by_project.entry(project).or_default().push(diagnostic);
        true
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectId> {
        self.by_project.keys()
    }

    pub fn project(&self, project: &ProjectId) -> &[Diagnostic] {
        self.by_project
            .get(project)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.by_project.values().flatten()
    }

    /// Located diagnostics of one category, in project-key order.
    pub fn diagnostics_for(&self, category: &str) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.category == category).collect()
    }

    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.iter().map(|d| d.category.as_str()).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn len(&self) -> usize {
        self.by_project.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(name: &str) -> ProjectId {
        ProjectId::new(name)
    }

    #[test]
    fn derived_unit_ids_are_stable_and_separator_agnostic() {
        let a = UnitId::derived(&pid("app"), "src/lib.rs");
        let b = UnitId::derived(&pid("app"), r"src\lib.rs");
        let c = UnitId::derived(&pid("other"), "src/lib.rs");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn span_overlap_is_half_open() {
        assert!(Span::new(0, 5).overlaps(&Span::new(4, 6)));
        assert!(!Span::new(0, 5).overlaps(&Span::new(5, 6)));
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn analysis_result_drops_locationless_diagnostics() {
        let unit = UnitId::random();
        let result = AnalysisResult::from_diagnostics(vec![
            Diagnostic::new("C1", None),
            Diagnostic::at("C1", &pid("p"), unit, Span::new(0, 1)),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.project(&pid("p")).len(), 1);
    }

    #[test]
    fn analysis_result_partitions_by_project() {
        let u1 = UnitId::random();
        let u2 = UnitId::random();
        let result = AnalysisResult::from_diagnostics(vec![
            Diagnostic::at("C1", &pid("b"), u2, Span::new(0, 1)),
            Diagnostic::at("C2", &pid("a"), u1, Span::new(0, 1)),
            Diagnostic::at("C1", &pid("a"), u1, Span::new(2, 3)),
        ]);
        let projects: Vec<&str> = result.projects().map(ProjectId::as_str).collect();
        assert_eq!(projects, vec!["a", "b"]);
        assert_eq!(result.diagnostics_for("C1").len(), 2);
        assert_eq!(result.categories(), vec!["C1", "C2"]);
        assert!(result.project(&pid("missing")).is_empty());
    }

    #[test]
    fn diagnostic_serializes_properties_only_when_present() {
        let d = Diagnostic::new("naming", None);
        let json = serde_json::to_value(&d).expect("serialize");
        assert!(json.get("properties").is_none());

        let d = d.with_property("private_field", "true");
        let json = serde_json::to_value(&d).expect("serialize");
        assert_eq!(json["properties"]["private_field"], "true");
    }
}
