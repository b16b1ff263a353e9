//! Whole-snapshot resolution through a provider's batch mode.

use crate::engine::{
    CategorySummary, Engine, EngineError, EngineResult, Outcome, SkipReason, call_provider,
};
use crate::index::DiagnosticIndex;
use crate::ports::Cancellation;
use crate::provider::{FixAllContext, FixAllScope, FixContext, FixProvider, Operation};
use codefix_types::report::StrategyKind;
use codefix_types::{AnalysisResult, ProjectSnapshot};
use tracing::{debug, info};

pub(crate) fn apply_batch(
    engine: &Engine,
    snapshot: &ProjectSnapshot,
    analysis: &AnalysisResult,
    category: &str,
    provider: &dyn FixProvider,
    cancel: &dyn Cancellation,
) -> Result<EngineResult, EngineError> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let summary = CategorySummary::new(category, provider.name(), StrategyKind::Batch);
    match resolve(engine, snapshot, analysis, category, provider) {
        Ok(next) if next.same_content(snapshot) => {
            debug!(category, provider = provider.name(), "batch fix made no change");
            Ok(EngineResult {
                snapshot: snapshot.clone(),
                summary,
            })
        }
        Ok(next) => {
            let units = snapshot.changed_units(&next).len();
            info!(category, provider = provider.name(), units, "applied batch fix");
            // Batch resolution is exhaustive for its category.
            Ok(EngineResult {
                snapshot: next,
                summary: CategorySummary {
                    outcome: Outcome::Applied,
                    applied: 1,
                    ..summary
                },
            })
        }
        Err(reason) => Ok(EngineResult {
            snapshot: snapshot.clone(),
            summary: summary.skipped(reason),
        }),
    }
}

fn resolve(
    engine: &Engine,
    snapshot: &ProjectSnapshot,
    analysis: &AnalysisResult,
    category: &str,
    provider: &dyn FixProvider,
) -> Result<ProjectSnapshot, SkipReason> {
    // Any located diagnostic whose unit still exists will do; it only anchors
    // the resolution.
    let located: Vec<_> = analysis
        .diagnostics_for(category)
        .into_iter()
        .filter_map(|d| d.unit().map(|id| (d, id)))
        .collect();
    if located.is_empty() {
        return Err(SkipReason::NoApplicableDiagnostic);
    }
    let (anchor, unit) = located
        .into_iter()
        .find_map(|(d, id)| snapshot.unit(&id).map(|unit| (d, unit)))
        .ok_or(SkipReason::StaleLocation)?;
    let host = engine.host.as_ref();

    let _guard = engine.lock.enter();

    // Some providers derive the equivalence key from their single-diagnostic fix.
    let equivalence_key = call_provider(|| {
        provider.register_fixes(&FixContext {
            snapshot,
            unit,
            diagnostic: anchor,
            host,
        })
    })?
    .into_iter()
    .next()
    .and_then(|action| action.equivalence_key().map(str::to_string));

    let index = DiagnosticIndex::new(analysis);
    let action = call_provider(|| {
        provider.fix_all(&FixAllContext {
            snapshot,
            unit,
            scope: FixAllScope::Snapshot,
            equivalence_key: equivalence_key.as_deref(),
            category,
            diagnostics: &index,
            host,
        })
    })?
    .ok_or(SkipReason::NoFix)?;

    debug!(category, action = action.title(), "resolving batch action");
    let ops = call_provider(|| action.resolve())?;
    match <[Operation; 1]>::try_from(ops) {
        Ok([Operation::ApplySnapshot(next)]) => Ok(next),
        Ok(other) => Err(SkipReason::shape(&other)),
        Err(ops) => Err(SkipReason::shape(&ops)),
    }
}
