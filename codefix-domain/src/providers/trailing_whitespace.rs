use super::disjoint_spans;
use crate::provider::{
    BatchSupport, CodeAction, FixAllContext, FixAllScope, FixContext, FixProvider,
};
use codefix_edit::{TextEdit, edit_unit};
use codefix_types::{Diagnostic, ProjectSnapshot, Span, UnitId};
use std::collections::BTreeMap;
use tracing::debug;

/// Deletes trailing whitespace flagged by `whitespace.trailing` diagnostics.
///
/// Supports every batch scope; at snapshot scope it queries each project's
/// diagnostics through the diagnostic source and edits all units at once.
pub struct TrailingWhitespaceProvider;

impl TrailingWhitespaceProvider {
    const CATEGORY: &'static str = "whitespace.trailing";
    const EQUIVALENCE_KEY: &'static str = "whitespace.trailing.delete";

    /// Span still holds only blanks.
    fn is_trailing_blank(text: &str) -> bool {
        !text.is_empty() && text.chars().all(|c| c == ' ' || c == '\t')
    }

    fn deletions(
        snapshot: &ProjectSnapshot,
        diagnostics: &[Diagnostic],
    ) -> BTreeMap<UnitId, Vec<Span>> {
        let mut by_unit: BTreeMap<UnitId, Vec<Span>> = BTreeMap::new();
        for d in diagnostics {
            let Some(loc) = &d.location else { continue };
            let Some(unit) = snapshot.unit(&loc.unit) else {
                continue;
            };
            match unit.text_at(loc.span) {
                Some(text) if Self::is_trailing_blank(text) => {
                    by_unit.entry(loc.unit).or_default().push(loc.span);
                }
                _ => debug!(
                    unit = %loc.unit,
                    span = %loc.span,
                    "span no longer trailing whitespace"
                ),
            }
        }
        by_unit
    }
}

impl FixProvider for TrailingWhitespaceProvider {
    fn name(&self) -> &str {
        "whitespace.trailing"
    }

    fn categories(&self) -> &[&str] {
        &[Self::CATEGORY]
    }

    fn description(&self) -> &str {
        "Removes trailing spaces and tabs at the end of lines"
    }

    fn batch_support(&self) -> BatchSupport {
        BatchSupport::Scopes(vec![
            FixAllScope::Unit,
            FixAllScope::Project,
            FixAllScope::Snapshot,
        ])
    }

    fn register_fixes(&self, ctx: &FixContext<'_>) -> anyhow::Result<Vec<CodeAction>> {
        let Some(span) = ctx.diagnostic.span() else {
            return Ok(vec![]);
        };
        if !ctx.unit.text_at(span).is_some_and(Self::is_trailing_blank) {
            return Ok(vec![]);
        }
        let next = edit_unit(ctx.snapshot, &ctx.unit.id, &[TextEdit::delete(span)])?;
        Ok(vec![
            CodeAction::apply_snapshot("Remove trailing whitespace", next)
                .with_equivalence_key(Self::EQUIVALENCE_KEY),
        ])
    }

    fn fix_all(&self, ctx: &FixAllContext<'_>) -> anyhow::Result<Option<CodeAction>> {
        if ctx.equivalence_key.is_some_and(|k| k != Self::EQUIVALENCE_KEY) {
            return Ok(None);
        }

        let diagnostics = ctx.scope_diagnostics();
        let deletions = Self::deletions(ctx.snapshot, &diagnostics);
        if deletions.is_empty() {
            return Ok(None);
        }

        let mut next = ctx.snapshot.clone();
        for (unit, spans) in deletions {
            let edits: Vec<TextEdit> = disjoint_spans(spans)
                .into_iter()
                .map(TextEdit::delete)
                .collect();
            next = edit_unit(&next, &unit, &edits)?;
        }
        Ok(Some(
            CodeAction::apply_snapshot("Remove all trailing whitespace", next)
                .with_equivalence_key(Self::EQUIVALENCE_KEY),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DiagnosticIndex;
    use crate::ports::NoopHostServices;
    use crate::provider::Operation;
    use codefix_types::{AnalysisResult, Project, ProjectId, Unit};
    use pretty_assertions::assert_eq;

    fn resolved_text(action: CodeAction, unit: &UnitId) -> String {
        match action.resolve().expect("resolve").pop() {
            Some(Operation::ApplySnapshot(s)) => s.unit(unit).expect("unit").text.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn fix_all_removes_duplicates_once() {
        let p = ProjectId::new("app");
        let id = UnitId::random();
        let snapshot = ProjectSnapshot::new(
            [Project::new(p.clone())],
            [Unit::new(id, p.clone(), "a  \nb\t\n")],
        );
        let analysis = AnalysisResult::from_diagnostics(vec![
            Diagnostic::at("whitespace.trailing", &p, id, Span::new(1, 3)),
            Diagnostic::at("whitespace.trailing", &p, id, Span::new(1, 3)),
            Diagnostic::at("whitespace.trailing", &p, id, Span::new(5, 6)),
        ]);
        let index = DiagnosticIndex::new(&analysis);
        let ctx = FixAllContext {
            snapshot: &snapshot,
            unit: snapshot.unit(&id).expect("unit"),
            scope: FixAllScope::Snapshot,
            equivalence_key: Some(TrailingWhitespaceProvider::EQUIVALENCE_KEY),
            category: "whitespace.trailing",
            diagnostics: &index,
            host: &NoopHostServices,
        };
        let action = TrailingWhitespaceProvider
            .fix_all(&ctx)
            .expect("fix_all")
            .expect("action");
        assert_eq!(resolved_text(action, &id), "a\nb\n");
    }

    #[test]
    fn register_fixes_declines_stale_span() {
        let p = ProjectId::new("app");
        let id = UnitId::random();
        let snapshot = ProjectSnapshot::new(
            [Project::new(p.clone())],
            [Unit::new(id, p.clone(), "abc  ")],
        );
        let diagnostic = Diagnostic::at("whitespace.trailing", &p, id, Span::new(0, 2));
        let ctx = FixContext {
            snapshot: &snapshot,
            unit: snapshot.unit(&id).expect("unit"),
            diagnostic: &diagnostic,
            host: &NoopHostServices,
        };
        assert!(TrailingWhitespaceProvider.register_fixes(&ctx).expect("ok").is_empty());
    }
}
