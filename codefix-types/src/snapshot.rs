use crate::diagnostic::{ProjectId, Span, UnitId};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// Directory the project's unit paths are relative to, when loaded from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Utf8PathBuf>,
}

impl Project {
    pub fn new(id: ProjectId) -> Self {
        Self { id, root: None }
    }
}

/// One source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub project: ProjectId,

    /// Path relative to the project root; absent for generated content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,

    pub text: String,
}

impl Unit {
    pub fn new(id: UnitId, project: ProjectId, text: impl Into<String>) -> Self {
        Self {
            id,
            project,
            path: None,
            text: text.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Text covered by `span`, or `None` when the span is out of range or splits a char.
    pub fn text_at(&self, span: Span) -> Option<&str> {
        if span.start > span.end {
            return None;
        }
        self.text.get(span.start..span.end)
    }

    /// 1-based line and column (in chars) of a byte offset. Offsets past the end clamp.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let mut line = 1;
        let mut line_start = 0;
        for (i, b) in self.text.bytes().enumerate() {
            if i >= offset {
                break;
            }
            if b == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        let col = self
            .text
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - line_start);
        (line, col + 1)
    }

    pub fn display_name(&self) -> String {
        match &self.path {
            Some(p) => format!("{}:{}", self.project, p),
            None => format!("{}:<{}>", self.project, self.id),
        }
    }
}

/// Immutable, versioned view of every unit and project.
///
/// Derivations (`with_*`) return a new snapshot and share untouched units with
/// the receiver through `Arc`. A snapshot is never mutated once handed out.
#[derive(Debug, Clone, Default)]
pub struct ProjectSnapshot {
    version: u64,
    projects: Arc<BTreeMap<ProjectId, Project>>,
    units: BTreeMap<UnitId, Arc<Unit>>,
}

impl ProjectSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        projects: impl IntoIterator<Item = Project>,
        units: impl IntoIterator<Item = Unit>,
    ) -> Self {
        let projects = projects.into_iter().map(|p| (p.id.clone(), p)).collect();
        let units = units.into_iter().map(|u| (u.id, Arc::new(u))).collect();
        Self {
            version: 0,
            projects: Arc::new(projects),
            units,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().map(Arc::as_ref)
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id).map(Arc::as_ref)
    }

    pub fn units_in<'a>(
        &'a self,
        project: &ProjectId,
    ) -> impl Iterator<Item = &'a Unit> + use<'a> {
        let project = project.clone();
        self.units().filter(move |u| u.project == project)
    }

    pub fn unit_by_path(&self, project: &ProjectId, path: &Utf8Path) -> Option<&Unit> {
        self.units()
            .find(|u| &u.project == project && u.path.as_deref() == Some(path))
    }

    /// New snapshot with `id`'s text replaced. `None` when the unit does not exist.
    pub fn with_unit_text(&self, id: &UnitId, text: impl Into<String>) -> Option<Self> {
        let current = self.units.get(id)?;
        let mut unit = Unit::clone(current);
        unit.text = text.into();

        let mut units = self.units.clone();
        units.insert(*id, Arc::new(unit));
        Some(Self {
            version: self.version + 1,
            projects: Arc::clone(&self.projects),
            units,
        })
    }

    /// New snapshot with `unit` added or replaced; its project is registered if unknown.
    pub fn with_unit(&self, unit: Unit) -> Self {
        let mut projects = Arc::clone(&self.projects);
        if !projects.contains_key(&unit.project) {
            Arc::make_mut(&mut projects)
                .insert(unit.project.clone(), Project::new(unit.project.clone()));
        }
        let mut units = self.units.clone();
        units.insert(unit.id, Arc::new(unit));
        Self {
            version: self.version + 1,
            projects,
            units,
        }
    }

    /// Structural equality: same projects and units with identical text. The
    /// version counter is not compared.
    pub fn same_content(&self, other: &ProjectSnapshot) -> bool {
        if self.projects != other.projects || self.units.len() != other.units.len() {
            return false;
        }
        self.units.iter().zip(other.units.iter()).all(|((a_id, a), (b_id, b))| {
            a_id == b_id && (Arc::ptr_eq(a, b) || a == b)
        })
    }

    /// Units whose content differs between `self` and `other`, including units
    /// present on only one side.
    pub fn changed_units(&self, other: &ProjectSnapshot) -> Vec<UnitId> {
        let mut out = Vec::new();
        for (id, unit) in &self.units {
            match other.units.get(id) {
                Some(o) if Arc::ptr_eq(unit, o) || unit == o => {}
                _ => out.push(*id),
            }
        }
        for id in other.units.keys() {
            if !self.units.contains_key(id) {
                out.push(*id);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot_with(text: &str) -> (ProjectSnapshot, UnitId) {
        let pid = ProjectId::new("app");
        let id = UnitId::derived(&pid, "src/lib.rs");
        let unit = Unit::new(id, pid.clone(), text).with_path("src/lib.rs");
        (ProjectSnapshot::new([Project::new(pid)], [unit]), id)
    }

    #[test]
    fn with_unit_text_produces_new_version_and_leaves_original() {
        let (snap, id) = snapshot_with("let a = 1;");
        let next = snap.with_unit_text(&id, "let b = 2;").expect("unit exists");

        assert_eq!(snap.unit(&id).map(|u| u.text.as_str()), Some("let a = 1;"));
        assert_eq!(next.unit(&id).map(|u| u.text.as_str()), Some("let b = 2;"));
        assert_eq!(next.version(), snap.version() + 1);
        assert!(!snap.same_content(&next));
        assert_eq!(snap.changed_units(&next), vec![id]);
    }

    #[test]
    fn with_unit_text_missing_unit_is_none() {
        let (snap, _) = snapshot_with("x");
        assert!(snap.with_unit_text(&UnitId::random(), "y").is_none());
    }

    #[test]
    fn same_content_ignores_version() {
        let (snap, id) = snapshot_with("same");
        let next = snap.with_unit_text(&id, "same").expect("unit exists");
        assert_ne!(snap.version(), next.version());
        assert!(snap.same_content(&next));
        assert!(snap.changed_units(&next).is_empty());
    }

    #[test]
    fn with_unit_registers_project() {
        let snap = ProjectSnapshot::empty();
        let pid = ProjectId::new("gen");
        let next = snap.with_unit(Unit::new(UnitId::random(), pid.clone(), "generated"));
        assert!(next.project(&pid).is_some());
        assert_eq!(next.units_in(&pid).count(), 1);
        assert_eq!(snap.units().count(), 0);
    }

    #[test]
    fn unit_lookup_by_path() {
        let (snap, id) = snapshot_with("x");
        let found = snap
            .unit_by_path(&ProjectId::new("app"), Utf8Path::new("src/lib.rs"))
            .map(|u| u.id);
        assert_eq!(found, Some(id));
    }

    #[test]
    fn looked_up_units_outlive_the_project_key() {
        let (snap, id) = snapshot_with("x");
        let (by_path, in_project) = {
            let key = ProjectId::new("app");
            let by_path = snap.unit_by_path(&key, Utf8Path::new("src/lib.rs"));
            let in_project: Vec<&Unit> = snap.units_in(&key).collect();
            (by_path, in_project)
        };
        assert_eq!(by_path.map(|u| u.id), Some(id));
        assert_eq!(in_project.len(), 1);
        let other = ProjectId::new("other");
        assert!(snap.unit_by_path(&other, Utf8Path::new("src/lib.rs")).is_none());
    }

    #[test]
    fn line_col_counts_lines_and_chars() {
        let (snap, id) = snapshot_with("ab\ncdé\nf");
        let unit = snap.unit(&id).expect("unit");
        assert_eq!(unit.line_col(0), (1, 1));
        assert_eq!(unit.line_col(3), (2, 1));
        assert_eq!(unit.line_col(7), (2, 4));
        assert_eq!(unit.line_col(999), (3, 2));
    }

    #[test]
    fn text_at_rejects_bad_spans() {
        let (snap, id) = snapshot_with("héllo");
        let unit = snap.unit(&id).expect("unit");
        assert_eq!(unit.text_at(Span::new(0, 1)), Some("h"));
        assert_eq!(unit.text_at(Span::new(1, 2)), None);
        assert_eq!(unit.text_at(Span::new(4, 2)), None);
        assert_eq!(unit.text_at(Span::new(0, 100)), None);
    }
}
