//! Routes each (category, provider) pair to a strategy and threads the
//! snapshot through a pass.

use crate::capability::Capability;
use crate::policy::FallbackPolicy;
use crate::ports::{Cancellation, HostServices, InvocationLock, NoopHostServices};
use crate::provider::{FixProvider, Operation};
use crate::{batch, fallback};
use codefix_types::report::{EntryStatus, StrategyKind};
use codefix_types::{AnalysisResult, ProjectSnapshot};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a category made no change. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("provider has no project-wide batch mode and the category is not fallback-eligible")]
    UnsupportedStrategy,
    #[error("no applicable diagnostic")]
    NoApplicableDiagnostic,
    #[error("provider returned no fix for this category")]
    NoFix,
    #[error("unexpected result shape: {0}")]
    UnexpectedResultShape(String),
    #[error("diagnostic unit no longer in snapshot")]
    StaleLocation,
    #[error("provider failed: {0}")]
    ProviderFailed(String),
}

impl SkipReason {
    pub(crate) fn provider(err: anyhow::Error) -> Self {
        SkipReason::ProviderFailed(format!("{err:#}"))
    }

    fn panicked(payload: &(dyn Any + Send)) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        SkipReason::ProviderFailed(format!("provider panicked: {detail}"))
    }

    pub(crate) fn shape(ops: &[Operation]) -> Self {
        let kinds: Vec<&str> = ops.iter().map(Operation::kind).collect();
        SkipReason::UnexpectedResultShape(format!(
            "expected exactly one apply_snapshot operation, got {kinds:?}"
        ))
    }
}

/// Run one provider call. An error or a panic inside it becomes `ProviderFailed`.
pub(crate) fn call_provider<T>(
    call: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, SkipReason> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.map_err(SkipReason::provider),
        Err(payload) => Err(SkipReason::panicked(payload.as_ref())),
    }
}

/// The only error that escapes the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    NoChange,
    Skipped(SkipReason),
}

impl Outcome {
    pub fn status(&self) -> EntryStatus {
        match self {
            Outcome::Applied => EntryStatus::Applied,
            Outcome::NoChange => EntryStatus::NoChange,
            Outcome::Skipped(_) => EntryStatus::Skipped,
        }
    }

    pub fn reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// What happened to one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: String,
    pub provider: String,
    pub strategy: StrategyKind,
    pub outcome: Outcome,
    /// Diagnostics (fallback) or action sets (batch) that changed the snapshot.
    pub applied: u64,
    /// Fallback diagnostics that could not be fixed.
    pub failed: u64,
    pub needs_another_pass: bool,
}

impl CategorySummary {
    pub(crate) fn new(category: &str, provider: &str, strategy: StrategyKind) -> Self {
        Self {
            category: category.to_string(),
            provider: provider.to_string(),
            strategy,
            outcome: Outcome::NoChange,
            applied: 0,
            failed: 0,
            needs_another_pass: false,
        }
    }

    pub(crate) fn skipped(mut self, reason: SkipReason) -> Self {
        warn!(
            category = self.category.as_str(),
            provider = self.provider.as_str(),
            reason = %reason,
            "category left unfixed"
        );
        self.outcome = Outcome::Skipped(reason);
        self
    }
}

/// Snapshot after one (category, provider) invocation.
#[derive(Debug, Clone)]
pub struct EngineResult {
    pub snapshot: ProjectSnapshot,
    pub summary: CategorySummary,
}

impl EngineResult {
    pub fn needs_another_pass(&self) -> bool {
        self.summary.needs_another_pass
    }
}

/// Result of one sweep over every (category, provider) pair.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub snapshot: ProjectSnapshot,
    pub needs_another_pass: bool,
    pub results: Vec<CategorySummary>,
}

impl PassReport {
    pub fn changed(&self) -> bool {
        self.results
            .iter()
            .any(|r| matches!(r.outcome, Outcome::Applied))
    }
}

/// The fix application engine.
pub struct Engine {
    pub(crate) policy: FallbackPolicy,
    pub(crate) host: Arc<dyn HostServices>,
    pub(crate) lock: InvocationLock,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(FallbackPolicy::default())
    }
}

impl Engine {
    pub fn new(policy: FallbackPolicy) -> Self {
        Self {
            policy,
            host: Arc::new(NoopHostServices),
            lock: InvocationLock::none(),
        }
    }

    pub fn with_host(mut self, host: Arc<dyn HostServices>) -> Self {
        self.host = host;
        self
    }

    pub fn with_lock(mut self, lock: InvocationLock) -> Self {
        self.lock = lock;
        self
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Apply one category's fixes. `snapshot` is never modified; the returned
    /// result carries either a new snapshot or a clone of the input.
    pub fn apply_category(
        &self,
        snapshot: &ProjectSnapshot,
        analysis: &AnalysisResult,
        category: &str,
        provider: &dyn FixProvider,
        cancel: &dyn Cancellation,
    ) -> Result<EngineResult, EngineError> {
        let capability = Capability::probe(provider);
        let rule = self.policy.rule_for(category);
        debug!(
            category,
            provider = provider.name(),
            capability = capability.label(),
            strategy = ?capability.strategy(rule.is_some()),
            "selected strategy"
        );

        match (capability, rule) {
            (Capability::ProjectWideBatch, _) => {
                batch::apply_batch(self, snapshot, analysis, category, provider, cancel)
            }
            (_, Some(rule)) => {
                fallback::apply_fallback(self, snapshot, analysis, category, provider, rule, cancel)
            }
            (_, None) => Ok(EngineResult {
                snapshot: snapshot.clone(),
                summary: CategorySummary::new(category, provider.name(), StrategyKind::Unsupported)
                    .skipped(SkipReason::UnsupportedStrategy),
            }),
        }
    }

    /// One pass: every pair in order, each seeing the snapshot the previous one left.
    pub fn run_pass<'p, I>(
        &self,
        snapshot: &ProjectSnapshot,
        analysis: &AnalysisResult,
        pairs: I,
        cancel: &dyn Cancellation,
    ) -> Result<PassReport, EngineError>
    where
        I: IntoIterator<Item = (&'p str, &'p dyn FixProvider)>,
    {
        let mut current = snapshot.clone();
        let mut results = Vec::new();

        for (category, provider) in pairs {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            self.host
                .progress(&format!("fixing {category} with {}", provider.name()));
            let result = self.apply_category(&current, analysis, category, provider, cancel)?;
            current = result.snapshot;
            results.push(result.summary);
        }

        let needs_another_pass = results.iter().any(|r| r.needs_another_pass);
        Ok(PassReport {
            snapshot: current,
            needs_another_pass,
            results,
        })
    }
}
