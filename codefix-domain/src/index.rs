//! Diagnostic lookup service handed to batch providers.

use codefix_types::{AnalysisResult, Diagnostic, ProjectId, UnitId};

/// Where a batch provider reads diagnostics from.
///
/// Lookups never fail: a project or unit with no diagnostics yields an empty
/// sequence. Providers may query projects other than the one they were
/// anchored in, which is how cross-file batch fixes find their targets.
pub trait DiagnosticSource {
    fn project_diagnostics(&self, project: &ProjectId) -> Vec<Diagnostic>;

    fn unit_diagnostics(&self, project: &ProjectId, unit: &UnitId) -> Vec<Diagnostic>;

    fn all_diagnostics(&self) -> Vec<Diagnostic>;
}

/// [`DiagnosticSource`] over one [`AnalysisResult`].
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticIndex<'a> {
    analysis: &'a AnalysisResult,
}

impl<'a> DiagnosticIndex<'a> {
    pub fn new(analysis: &'a AnalysisResult) -> Self {
        Self { analysis }
    }
}

impl DiagnosticSource for DiagnosticIndex<'_> {
    fn project_diagnostics(&self, project: &ProjectId) -> Vec<Diagnostic> {
        self.analysis.project(project).to_vec()
    }

    fn unit_diagnostics(&self, project: &ProjectId, unit: &UnitId) -> Vec<Diagnostic> {
        self.analysis
            .project(project)
            .iter()
            .filter(|d| d.unit().as_ref() == Some(unit))
            .cloned()
            .collect()
    }

    fn all_diagnostics(&self) -> Vec<Diagnostic> {
        self.analysis.iter().cloned().collect()
    }
}
