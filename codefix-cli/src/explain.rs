//! Provider lookup and strategy descriptions for `explain` and `list-providers`.

use codefix_domain::{Capability, FallbackPolicy, ProviderMeta, builtin_provider_metas};
use codefix_types::report::StrategyKind;

/// Lowercased, with `-` and `_` treated as `.` so `WHITESPACE_TRAILING` finds
/// `whitespace.trailing`.
fn normalize(key: &str) -> String {
    key.trim().to_lowercase().replace(['-', '_'], ".")
}

/// Look up a built-in provider by key or by one of its categories.
pub fn lookup_provider(key: &str) -> Option<ProviderMeta> {
    let wanted = normalize(key);
    let metas = builtin_provider_metas();
    let by_key = metas.iter().position(|m| normalize(&m.key) == wanted);
    let by_category = || {
        metas
            .iter()
            .position(|m| m.categories.iter().any(|c| normalize(c) == wanted))
    };
    by_key.or_else(by_category).map(|i| metas[i].clone())
}

pub fn list_provider_keys() -> Vec<String> {
    builtin_provider_metas().into_iter().map(|m| m.key).collect()
}

pub fn format_strategy(strategy: StrategyKind) -> &'static str {
    match strategy {
        StrategyKind::Batch => "BATCH",
        StrategyKind::Fallback => "FALLBACK",
        StrategyKind::Unsupported => "UNSUPPORTED",
    }
}

pub fn strategy_meaning(strategy: StrategyKind) -> &'static str {
    match strategy {
        StrategyKind::Batch => {
            "The provider resolves every diagnostic of the category across all projects\n\
             in one action. One invocation per pass; it never asks for another pass."
        }
        StrategyKind::Fallback => {
            "Diagnostics carrying the fallback marker are fixed one at a time, from the\n\
             end of each unit backwards. Failures are counted; another pass is requested\n\
             when some diagnostics failed and at least one fix landed."
        }
        StrategyKind::Unsupported => {
            "The provider has no project-wide batch mode and the category has no fallback\n\
             rule. Its diagnostics are skipped. Add a [[fallback]] rule to codefix.toml\n\
             to apply them one at a time."
        }
    }
}

pub fn capability_meaning(capability: Capability) -> &'static str {
    match capability {
        Capability::ProjectWideBatch => "batch over the whole snapshot",
        Capability::ScopedBatch(_) => "batch within a narrower scope only",
        Capability::SingleOnly => "single diagnostic fixes only",
    }
}

/// One line per category: `category`, chosen strategy, and the fallback marker if any.
pub fn category_lines(meta: &ProviderMeta, policy: &FallbackPolicy) -> Vec<String> {
    meta.categories
        .iter()
        .map(|category| {
            let strategy = meta.strategy_for(category, policy);
            let marker = match policy.rule_for(category) {
                Some(rule) if strategy == StrategyKind::Fallback => match &rule.value {
                    Some(value) => format!(" (when {} = {})", rule.property, value),
                    None => format!(" (when {} is present)", rule.property),
                },
                _ => String::new(),
            };
            format!("{:<24} {}{}", category, format_strategy(strategy), marker)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codefix_domain::FallbackRule;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_by_key() {
        let meta = lookup_provider("whitespace.trailing").expect("should find provider");
        assert_eq!(meta.key, "whitespace.trailing");
    }

    #[test]
    fn test_lookup_normalizes_case_and_separators() {
        assert!(lookup_provider("WHITESPACE_TRAILING").is_some());
        assert!(lookup_provider("whitespace-trailing").is_some());
        assert!(lookup_provider(" Naming ").is_some());
        assert!(lookup_provider("nonexistent").is_none());
    }

    #[test]
    fn test_all_providers_listed() {
        assert_eq!(
            list_provider_keys(),
            vec!["whitespace.trailing", "naming", "suggestion"]
        );
    }

    #[test]
    fn test_category_lines_follow_policy() {
        let suggestion = lookup_provider("suggestion").expect("suggestion");

        let lines = category_lines(&suggestion, &FallbackPolicy::default());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("UNSUPPORTED"));

        let policy = FallbackPolicy::default()
            .with_rule(FallbackRule::new("suggestion", "replacement"));
        let lines = category_lines(&suggestion, &policy);
        assert!(lines[0].contains("FALLBACK (when replacement is present)"));
    }

    #[test]
    fn test_naming_is_fallback_by_default() {
        let naming = lookup_provider("naming").expect("naming");
        let lines = category_lines(&naming, &FallbackPolicy::default());
        assert!(lines[0].contains("FALLBACK (when private_field = true)"));
        assert_eq!(capability_meaning(naming.capability), "single diagnostic fixes only");
    }
}
