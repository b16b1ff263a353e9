use crate::capability::Capability;
use crate::policy::FallbackPolicy;
use crate::provider::FixProvider;
use codefix_types::report::StrategyKind;
use codefix_types::Span;

mod naming;
mod suggestion;
mod trailing_whitespace;

pub use naming::PrivateFieldNamingProvider;
pub use suggestion::SuggestedEditProvider;
pub use trailing_whitespace::TrailingWhitespaceProvider;

/// Catalog entry describing a built-in provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMeta {
    pub key: String,
    pub description: String,
    pub categories: Vec<String>,
    pub capability: Capability,
}

impl ProviderMeta {
    pub fn of(provider: &dyn FixProvider) -> Self {
        Self {
            key: provider.name().to_string(),
            description: provider.description().to_string(),
            categories: provider.categories().iter().map(|c| c.to_string()).collect(),
            capability: Capability::probe(provider),
        }
    }

    /// Strategy the engine will pick for `category` under `policy`.
    pub fn strategy_for(&self, category: &str, policy: &FallbackPolicy) -> StrategyKind {
        self.capability.strategy(policy.rule_for(category).is_some())
    }
}

pub fn builtin_providers() -> Vec<Box<dyn FixProvider>> {
    vec![
        Box::new(TrailingWhitespaceProvider),
        Box::new(PrivateFieldNamingProvider),
        Box::new(SuggestedEditProvider),
    ]
}

pub fn builtin_provider_metas() -> Vec<ProviderMeta> {
    builtin_providers()
        .iter()
        .map(|p| ProviderMeta::of(p.as_ref()))
        .collect()
}

/// Sorted, deduplicated spans; a span overlapping the one kept before it is dropped.
fn disjoint_spans(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort();
    spans.dedup();
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if out.last().is_some_and(|last| last.overlaps(&span)) {
            continue;
        }
        out.push(span);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn catalog_lists_every_builtin() {
        let metas = builtin_provider_metas();
        let keys: Vec<&str> = metas.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["whitespace.trailing", "naming", "suggestion"]);
        assert!(metas.iter().all(|m| !m.description.is_empty()));
    }

    #[test]
    fn catalog_strategies_follow_capability_and_policy() {
        let metas = builtin_provider_metas();
        let policy = FallbackPolicy::default();
        assert_eq!(metas[0].strategy_for("whitespace.trailing", &policy), StrategyKind::Batch);
        assert_eq!(metas[1].strategy_for("naming", &policy), StrategyKind::Fallback);
        assert_eq!(metas[2].strategy_for("suggestion", &policy), StrategyKind::Unsupported);
    }

    #[test]
    fn disjoint_spans_dedups_and_drops_overlaps() {
        let spans = disjoint_spans(vec![
            Span::new(10, 12),
            Span::new(0, 4),
            Span::new(0, 4),
            Span::new(3, 5),
            Span::new(12, 13),
        ]);
        assert_eq!(spans, vec![Span::new(0, 4), Span::new(10, 12), Span::new(12, 13)]);
    }
}
