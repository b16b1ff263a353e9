//! One-diagnostic-at-a-time application for providers without project-wide batch mode.
//!
//! Diagnostics are processed from the end of each unit backwards. An edit only
//! shifts offsets after it, so every diagnostic still pending keeps a valid span
//! in the current snapshot and no offset translation is needed. Units are
//! re-resolved by id on every step because an earlier edit may have replaced
//! them.

use crate::engine::{
    CategorySummary, Engine, EngineError, EngineResult, Outcome, SkipReason, call_provider,
};
use crate::policy::FallbackRule;
use crate::ports::Cancellation;
use crate::provider::{FixContext, FixProvider, Operation};
use codefix_types::report::StrategyKind;
use codefix_types::{AnalysisResult, Diagnostic, Location, ProjectSnapshot};
use tracing::{debug, info, warn};

pub(crate) fn apply_fallback(
    engine: &Engine,
    snapshot: &ProjectSnapshot,
    analysis: &AnalysisResult,
    category: &str,
    provider: &dyn FixProvider,
    rule: &FallbackRule,
    cancel: &dyn Cancellation,
) -> Result<EngineResult, EngineError> {
    let summary = CategorySummary::new(category, provider.name(), StrategyKind::Fallback);

    let eligible = ordered_eligible(analysis, category, rule);
    if eligible.is_empty() {
        return Ok(EngineResult {
            snapshot: snapshot.clone(),
            summary: summary.skipped(SkipReason::NoApplicableDiagnostic),
        });
    }

    let mut current = snapshot.clone();
    let mut applied = 0u64;
    let mut failed = 0u64;

    for (diagnostic, location) in eligible {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match fix_one(engine, &current, diagnostic, location, provider) {
            Ok(Some(next)) => {
                current = next;
                applied += 1;
            }
            Ok(None) => {
                debug!(
                    category,
                    unit = %location.unit,
                    span = %location.span,
                    "fix made no change"
                );
            }
            Err(reason) => {
                failed += 1;
                warn!(
                    category,
                    provider = provider.name(),
                    unit = %location.unit,
                    span = %location.span,
                    reason = %reason,
                    "diagnostic left unfixed"
                );
            }
        }
    }

    let made_changes = applied > 0;
    // A failure may clear once an earlier-in-document edit lands; only worth
    // retrying when this pass made progress.
    let needs_another_pass = made_changes && failed > 0;
    info!(
        category,
        provider = provider.name(),
        applied,
        failed,
        needs_another_pass,
        "fallback pass done"
    );

    Ok(EngineResult {
        snapshot: current,
        summary: CategorySummary {
            outcome: if made_changes {
                Outcome::Applied
            } else {
                Outcome::NoChange
            },
            applied,
            failed,
            needs_another_pass,
            ..summary
        },
    })
}

/// Diagnostics carrying the rule's marker, sorted by (unit, span) descending.
pub(crate) fn ordered_eligible<'a>(
    analysis: &'a AnalysisResult,
    category: &str,
    rule: &FallbackRule,
) -> Vec<(&'a Diagnostic, &'a Location)> {
    let mut eligible: Vec<(&Diagnostic, &Location)> = analysis
        .diagnostics_for(category)
        .into_iter()
        .filter(|d| rule.matches(d))
        .filter_map(|d| d.location.as_ref().map(|loc| (d, loc)))
        .collect();
    eligible.sort_by(|(_, a), (_, b)| (b.unit, b.span).cmp(&(a.unit, a.span)));
    eligible
}

/// `Ok(None)` when the provider's edit leaves the snapshot structurally unchanged.
fn fix_one(
    engine: &Engine,
    current: &ProjectSnapshot,
    diagnostic: &Diagnostic,
    location: &Location,
    provider: &dyn FixProvider,
) -> Result<Option<ProjectSnapshot>, SkipReason> {
    let unit = current.unit(&location.unit).ok_or(SkipReason::StaleLocation)?;

    let _guard = engine.lock.enter();
    let action = call_provider(|| {
        provider.register_fixes(&FixContext {
            snapshot: current,
            unit,
            diagnostic,
            host: engine.host.as_ref(),
        })
    })?
    .into_iter()
    .next()
    .ok_or(SkipReason::NoFix)?;

    let ops = call_provider(|| action.resolve())?;
    let next = take_snapshot(&ops).ok_or_else(|| SkipReason::shape(&ops))?;
    Ok((!next.same_content(current)).then(|| next.clone()))
}

/// The single snapshot operation, ignoring operations of other kinds.
fn take_snapshot(ops: &[Operation]) -> Option<&ProjectSnapshot> {
    let mut snapshots = ops.iter().filter_map(|op| match op {
        Operation::ApplySnapshot(s) => Some(s),
        _ => None,
    });
    match (snapshots.next(), snapshots.next()) {
        (Some(s), None) => Some(s),
        _ => None,
    }
}
