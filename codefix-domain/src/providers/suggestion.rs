use super::disjoint_spans;
use crate::provider::{
    BatchSupport, CodeAction, FixAllContext, FixAllScope, FixContext, FixProvider,
};
use codefix_edit::{TextEdit, edit_unit};
use codefix_types::{Diagnostic, Span};
use std::collections::BTreeMap;

/// Applies the literal replacement an analyzer attached to a `suggestion`
/// diagnostic in its `replacement` property.
///
/// Batch mode is limited to a single unit, so the engine treats this provider
/// as single-diagnostic only. It runs through the sequential path when a
/// fallback rule names its category.
pub struct SuggestedEditProvider;

impl SuggestedEditProvider {
    const CATEGORY: &'static str = "suggestion";
    pub const REPLACEMENT_PROPERTY: &'static str = "replacement";
    const EQUIVALENCE_KEY: &'static str = "suggestion.replace";

    fn edit_for(diagnostic: &Diagnostic) -> Option<TextEdit> {
        let span = diagnostic.span()?;
        let replacement = diagnostic.property(Self::REPLACEMENT_PROPERTY)?;
        Some(TextEdit::new(span, replacement))
    }
}

impl FixProvider for SuggestedEditProvider {
    fn name(&self) -> &str {
        "suggestion"
    }

    fn categories(&self) -> &[&str] {
        &[Self::CATEGORY]
    }

    fn description(&self) -> &str {
        "Replaces the flagged span with the analyzer's suggested text"
    }

    fn batch_support(&self) -> BatchSupport {
        BatchSupport::Scopes(vec![FixAllScope::Unit])
    }

    fn register_fixes(&self, ctx: &FixContext<'_>) -> anyhow::Result<Vec<CodeAction>> {
        let Some(edit) = Self::edit_for(ctx.diagnostic) else {
            return Ok(vec![]);
        };
        if ctx.unit.text_at(edit.span) == Some(edit.new_text.as_str()) {
            return Ok(vec![]);
        }
        let title = format!("Replace with '{}'", edit.new_text);
        let next = edit_unit(ctx.snapshot, &ctx.unit.id, &[edit])?;
        Ok(vec![
            CodeAction::apply_snapshot(title, next).with_equivalence_key(Self::EQUIVALENCE_KEY),
        ])
    }

    fn fix_all(&self, ctx: &FixAllContext<'_>) -> anyhow::Result<Option<CodeAction>> {
        if ctx.scope != FixAllScope::Unit {
            anyhow::bail!("suggestion fixes only support unit scope, got {:?}", ctx.scope);
        }

        // Keyed by span so overlapping suggestions resolve to the first one.
        let mut by_span: BTreeMap<Span, TextEdit> = BTreeMap::new();
        for edit in ctx.scope_diagnostics().iter().filter_map(Self::edit_for) {
            by_span.entry(edit.span).or_insert(edit);
        }
        let spans = disjoint_spans(by_span.keys().copied().collect());
        if spans.is_empty() {
            return Ok(None);
        }
        let edits: Vec<TextEdit> = spans.iter().filter_map(|s| by_span.remove(s)).collect();

        let next = edit_unit(ctx.snapshot, &ctx.unit.id, &edits)?;
        Ok(Some(
            CodeAction::apply_snapshot(
                format!("Apply {} suggestions in {}", edits.len(), ctx.unit.display_name()),
                next,
            )
            .with_equivalence_key(Self::EQUIVALENCE_KEY),
        ))
    }
}
