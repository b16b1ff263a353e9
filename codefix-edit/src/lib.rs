//! Edit primitives for codefix.
//!
//! Responsibilities:
//! - Apply a set of span replacements to one unit's text.
//! - Derive a new snapshot from a unit edit set.
//! - Render a unified diff between two snapshots.
//! - Hash unit contents for the run report.

mod error;

pub use error::{EditError, EditResult};

use codefix_types::report::ChangedUnit;
use codefix_types::{ProjectSnapshot, Span, Unit, UnitId};
use diffy::PatchFormatter;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Replace `span` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub new_text: String,
}

impl TextEdit {
    pub fn new(span: Span, new_text: impl Into<String>) -> Self {
        Self {
            span,
            new_text: new_text.into(),
        }
    }

    pub fn delete(span: Span) -> Self {
        Self::new(span, "")
    }
}

/// Apply `edits` to `text`. Spans refer to the original text; edits are applied
/// from the end backwards so earlier spans stay valid.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> EditResult<String> {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| e.span);

    for e in &sorted {
        check_span(text, e.span)?;
    }
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0].span, pair[1].span);
        // Two insertions at the same offset are ambiguous as well.
        if a.overlaps(&b) || (a == b && a.is_empty()) {
            return Err(EditError::Overlapping {
                first: a,
                second: b,
            });
        }
    }

    let mut out = text.to_string();
    for e in sorted.iter().rev() {
        out.replace_range(e.span.start..e.span.end, &e.new_text);
    }
    Ok(out)
}

fn check_span(text: &str, span: Span) -> EditResult<()> {
    if span.start > span.end || span.end > text.len() {
        return Err(EditError::OutOfBounds {
            span,
            len: text.len(),
        });
    }
    for offset in [span.start, span.end] {
        if !text.is_char_boundary(offset) {
            return Err(EditError::NotCharBoundary { offset });
        }
    }
    Ok(())
}

/// New snapshot with `edits` applied to `unit`. The input snapshot is untouched.
pub fn edit_unit(
    snapshot: &ProjectSnapshot,
    unit: &UnitId,
    edits: &[TextEdit],
) -> EditResult<ProjectSnapshot> {
    let current = snapshot.unit(unit).ok_or(EditError::UnknownUnit(*unit))?;
    let text = apply_edits(&current.text, edits)?;
    debug!(unit = %unit, edits = edits.len(), "edited unit");
    snapshot
        .with_unit_text(unit, text)
        .ok_or(EditError::UnknownUnit(*unit))
}

/// Unified diff of every unit whose text differs between `before` and `after`.
///
/// Units are labelled by path when they have one, otherwise by id.
pub fn render_patch(before: &ProjectSnapshot, after: &ProjectSnapshot) -> String {
    let mut out = String::new();
    let formatter = PatchFormatter::new();

    for id in before.changed_units(after) {
        let old = before.unit(&id);
        let new = after.unit(&id);
        let label = new.or(old).map(patch_label).unwrap_or_else(|| id.to_string());
        let old_text = old.map(|u| u.text.as_str()).unwrap_or_default();
        let new_text = new.map(|u| u.text.as_str()).unwrap_or_default();

        out.push_str(&format!("diff --git a/{0} b/{0}\n", label));
        out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", label));

        let patch = diffy::create_patch(old_text, new_text);
        out.push_str(&formatter.fmt_patch(&patch).to_string());
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}

fn patch_label(unit: &Unit) -> String {
    match &unit.path {
        Some(p) => format!("{}/{}", unit.project, p),
        None => format!("{}/<{}>", unit.project, unit.id),
    }
}

/// Report records for every unit changed between `before` and `after`.
pub fn changed_units(before: &ProjectSnapshot, after: &ProjectSnapshot) -> Vec<ChangedUnit> {
    before
        .changed_units(after)
        .into_iter()
        .filter_map(|id| {
            let old = before.unit(&id);
            let new = after.unit(&id);
            let unit = new.or(old)?;
            let old_text = old.map(|u| u.text.as_str()).unwrap_or_default();
            let new_text = new.map(|u| u.text.as_str()).unwrap_or_default();
            Some(ChangedUnit {
                unit: id,
                project: unit.project.clone(),
                path: unit.path.as_ref().map(|p| p.to_string()),
                before_sha256: sha256_hex(old_text.as_bytes()),
                after_sha256: sha256_hex(new_text.as_bytes()),
                before_bytes: old_text.len() as u64,
                after_bytes: new_text.len() as u64,
            })
        })
        .collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codefix_types::{Project, ProjectId};
    use pretty_assertions::assert_eq;

    fn snapshot(text: &str) -> (ProjectSnapshot, UnitId) {
        let pid = ProjectId::new("app");
        let id = UnitId::derived(&pid, "src/main.rs");
        let unit = Unit::new(id, pid.clone(), text).with_path("src/main.rs");
        (ProjectSnapshot::new([Project::new(pid)], [unit]), id)
    }

    #[test]
    fn apply_edits_composes_independent_spans() {
        let out = apply_edits(
            "let foo = bar;",
            &[
                TextEdit::new(Span::new(10, 13), "baz"),
                TextEdit::new(Span::new(4, 7), "x"),
            ],
        )
        .expect("apply");
        assert_eq!(out, "let x = baz;");
    }

    #[test]
    fn apply_edits_rejects_overlap() {
        let err = apply_edits(
            "abcdef",
            &[
                TextEdit::new(Span::new(0, 3), "x"),
                TextEdit::new(Span::new(2, 4), "y"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, EditError::Overlapping { .. }));
    }

    #[test]
    fn apply_edits_rejects_duplicate_insertions() {
        let err = apply_edits(
            "abc",
            &[
                TextEdit::new(Span::new(1, 1), "x"),
                TextEdit::new(Span::new(1, 1), "y"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, EditError::Overlapping { .. }));
    }

    #[test]
    fn adjacent_edits_do_not_overlap() {
        let out = apply_edits(
            "abcdef",
            &[
                TextEdit::new(Span::new(0, 3), "X"),
                TextEdit::new(Span::new(3, 6), "Y"),
            ],
        )
        .expect("apply");
        assert_eq!(out, "XY");
    }

    #[test]
    fn apply_edits_checks_bounds_and_boundaries() {
        assert_eq!(
            apply_edits("abc", &[TextEdit::delete(Span::new(1, 9))]),
            Err(EditError::OutOfBounds {
                span: Span::new(1, 9),
                len: 3
            })
        );
        assert_eq!(
            apply_edits("é", &[TextEdit::delete(Span::new(0, 1))]),
            Err(EditError::NotCharBoundary { offset: 1 })
        );
    }

    #[test]
    fn edit_unit_returns_new_snapshot() {
        let (snap, id) = snapshot("fn main() {}   \n");
        let next = edit_unit(&snap, &id, &[TextEdit::delete(Span::new(12, 15))]).expect("edit");
        assert_eq!(next.unit(&id).map(|u| u.text.as_str()), Some("fn main() {}\n"));
        assert_eq!(snap.unit(&id).map(|u| u.text.as_str()), Some("fn main() {}   \n"));
    }

    #[test]
    fn edit_unit_unknown_unit() {
        let (snap, _) = snapshot("x");
        let missing = UnitId::random();
        assert_eq!(
            edit_unit(&snap, &missing, &[]).unwrap_err(),
            EditError::UnknownUnit(missing)
        );
    }

    #[test]
    fn render_patch_labels_by_project_and_path() {
        let (snap, id) = snapshot("a\nb\n");
        let next = snap.with_unit_text(&id, "a\nc\n").expect("unit");
        let patch = render_patch(&snap, &next);
        assert!(patch.starts_with("diff --git a/app/src/main.rs b/app/src/main.rs\n"));
        assert!(patch.contains("-b\n"));
        assert!(patch.contains("+c\n"));
    }

    #[test]
    fn render_patch_empty_when_unchanged() {
        let (snap, _) = snapshot("a\n");
        assert_eq!(render_patch(&snap, &snap.clone()), "");
    }

    #[test]
    fn changed_units_hashes_both_sides() {
        let (snap, id) = snapshot("old");
        let next = snap.with_unit_text(&id, "newer").expect("unit");
        let changed = changed_units(&snap, &next);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].before_sha256, sha256_hex(b"old"));
        assert_eq!(changed[0].after_sha256, sha256_hex(b"newer"));
        assert_eq!(changed[0].before_bytes, 3);
        assert_eq!(changed[0].after_bytes, 5);
        assert_eq!(changed[0].path.as_deref(), Some("src/main.rs"));
    }
}
