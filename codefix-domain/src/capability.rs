//! Classifies a provider's batch capability once, before any resolution.

use crate::provider::{BatchSupport, FixAllScope, FixProvider};
use codefix_types::report::StrategyKind;

/// Outcome of probing a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Batch resolution over the whole snapshot.
    ProjectWideBatch,
    /// Batch resolution, but only up to the given scope.
    ScopedBatch(FixAllScope),
    SingleOnly,
}

impl Capability {
    /// Pure classification; the provider is only asked what it supports.
    pub fn probe(provider: &dyn FixProvider) -> Self {
        match provider.batch_support() {
            BatchSupport::None => Capability::SingleOnly,
            BatchSupport::Scopes(scopes) => match scopes.into_iter().max() {
                Some(FixAllScope::Snapshot) => Capability::ProjectWideBatch,
                Some(widest) => Capability::ScopedBatch(widest),
                None => Capability::SingleOnly,
            },
        }
    }

    /// Only project-wide batch support selects the batch path.
    pub fn strategy(self, fallback_eligible: bool) -> StrategyKind {
        match self {
            Capability::ProjectWideBatch => StrategyKind::Batch,
            _ if fallback_eligible => StrategyKind::Fallback,
            _ => StrategyKind::Unsupported,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Capability::ProjectWideBatch => "batch",
            Capability::ScopedBatch(FixAllScope::Project) => "batch (project)",
            Capability::ScopedBatch(_) => "batch (unit)",
            Capability::SingleOnly => "single",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CodeAction, FixContext};

    struct Probe(BatchSupport);

    impl FixProvider for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn categories(&self) -> &[&str] {
            &["C1"]
        }

        fn batch_support(&self) -> BatchSupport {
            self.0.clone()
        }

        fn register_fixes(&self, _ctx: &FixContext<'_>) -> anyhow::Result<Vec<CodeAction>> {
            Ok(vec![])
        }
    }

    #[test]
    fn probe_classifies_by_widest_scope() {
        use FixAllScope::*;
        let cases = [
            (BatchSupport::None, Capability::SingleOnly),
            (BatchSupport::Scopes(vec![]), Capability::SingleOnly),
            (BatchSupport::Scopes(vec![Unit]), Capability::ScopedBatch(Unit)),
            (
                BatchSupport::Scopes(vec![Project, Unit]),
                Capability::ScopedBatch(Project),
            ),
            (
                BatchSupport::Scopes(vec![Unit, Snapshot]),
                Capability::ProjectWideBatch,
            ),
        ];
        for (support, expected) in cases {
            assert_eq!(Capability::probe(&Probe(support.clone())), expected, "{support:?}");
        }
    }

    #[test]
    fn only_project_wide_batch_selects_batch_strategy() {
        assert_eq!(Capability::ProjectWideBatch.strategy(false), StrategyKind::Batch);
        assert_eq!(Capability::ProjectWideBatch.strategy(true), StrategyKind::Batch);
        assert_eq!(
            Capability::ScopedBatch(FixAllScope::Project).strategy(true),
            StrategyKind::Fallback
        );
        assert_eq!(Capability::SingleOnly.strategy(true), StrategyKind::Fallback);
        assert_eq!(Capability::SingleOnly.strategy(false), StrategyKind::Unsupported);
    }
}
