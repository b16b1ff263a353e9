use crate::provider::{CodeAction, FixContext, FixProvider};
use codefix_edit::{TextEdit, edit_unit};

/// Renames a private field at the diagnostic span to `<prefix>camelCase`.
///
/// Single-diagnostic only. Only the flagged occurrence is rewritten; references
/// carry their own diagnostics.
pub struct PrivateFieldNamingProvider;

impl PrivateFieldNamingProvider {
    const CATEGORY: &'static str = "naming";
    /// Host option overriding the default `_` prefix.
    pub const PREFIX_OPTION: &'static str = "naming.private_field_prefix";
    const DEFAULT_PREFIX: &'static str = "_";

    fn is_identifier(text: &str) -> bool {
        let mut chars = text.chars();
        match chars.next() {
            Some(c) if c == '_' || c.is_alphabetic() => {}
            _ => return false,
        }
        chars.all(|c| c == '_' || c.is_alphanumeric())
    }

    /// `my_field`, `MyField` and `_my_field` all become `myField`.
    fn camel_case(ident: &str) -> String {
        let mut out = String::with_capacity(ident.len());
        for (i, part) in ident.split('_').filter(|p| !p.is_empty()).enumerate() {
            let mut chars = part.chars();
            let Some(first) = chars.next() else { continue };
            if i == 0 {
                out.extend(first.to_lowercase());
            } else {
                out.extend(first.to_uppercase());
            }
            out.push_str(chars.as_str());
        }
        out
    }

    pub fn expected_name(ident: &str, prefix: &str) -> Option<String> {
        let body = Self::camel_case(ident);
        if body.is_empty() {
            return None;
        }
        Some(format!("{prefix}{body}"))
    }
}

impl FixProvider for PrivateFieldNamingProvider {
    fn name(&self) -> &str {
        "naming"
    }

    fn categories(&self) -> &[&str] {
        &[Self::CATEGORY]
    }

    fn description(&self) -> &str {
        "Renames private fields to the configured prefix plus camelCase"
    }

    fn register_fixes(&self, ctx: &FixContext<'_>) -> anyhow::Result<Vec<CodeAction>> {
        let Some(span) = ctx.diagnostic.span() else {
            return Ok(vec![]);
        };
        // A stale span no longer lands on an identifier.
        let Some(current) = ctx.unit.text_at(span).filter(|t| Self::is_identifier(t)) else {
            return Ok(vec![]);
        };

        let prefix = ctx
            .host
            .option(Self::PREFIX_OPTION)
            .unwrap_or_else(|| Self::DEFAULT_PREFIX.to_string());
        let Some(renamed) = Self::expected_name(current, &prefix) else {
            return Ok(vec![]);
        };
        if renamed == current {
            return Ok(vec![]);
        }

        let next = edit_unit(ctx.snapshot, &ctx.unit.id, &[TextEdit::new(span, renamed.clone())])?;
        Ok(vec![
            CodeAction::apply_snapshot(format!("Rename '{current}' to '{renamed}'"), next)
                .with_equivalence_key(format!("naming:{prefix}")),
        ])
    }
}
