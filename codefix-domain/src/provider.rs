use crate::index::DiagnosticSource;
use crate::ports::HostServices;
use codefix_types::{Diagnostic, ProjectId, ProjectSnapshot, Unit, UnitId};
use std::fmt;

/// Breadth a batch resolution may cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FixAllScope {
    /// The anchor unit only.
    Unit,
    /// Every unit of the anchor's project.
    Project,
    /// Every project in the snapshot.
    Snapshot,
}

/// Batch modes a provider offers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BatchSupport {
    #[default]
    None,
    Scopes(Vec<FixAllScope>),
}

/// A pluggable component that turns diagnostics of some categories into edits.
///
/// `register_fixes` is the single-diagnostic entry point every provider has.
/// Providers that declare scopes in `batch_support` also answer `fix_all`.
pub trait FixProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Categories this provider can fix.
    fn categories(&self) -> &[&str];

    fn description(&self) -> &str {
        ""
    }

    fn batch_support(&self) -> BatchSupport {
        BatchSupport::None
    }

    /// Actions for one diagnostic, most preferred first.
    fn register_fixes(&self, ctx: &FixContext<'_>) -> anyhow::Result<Vec<CodeAction>>;

    /// One action covering every matching diagnostic in `ctx.scope`.
    fn fix_all(&self, _ctx: &FixAllContext<'_>) -> anyhow::Result<Option<CodeAction>> {
        Ok(None)
    }
}

/// Input to [`FixProvider::register_fixes`].
pub struct FixContext<'a> {
    pub snapshot: &'a ProjectSnapshot,
    pub unit: &'a Unit,
    pub diagnostic: &'a Diagnostic,
    pub host: &'a dyn HostServices,
}

/// Input to [`FixProvider::fix_all`].
pub struct FixAllContext<'a> {
    pub snapshot: &'a ProjectSnapshot,
    /// Unit the resolution was triggered from.
    pub unit: &'a Unit,
    pub scope: FixAllScope,
    pub equivalence_key: Option<&'a str>,
    pub category: &'a str,
    pub diagnostics: &'a dyn DiagnosticSource,
    pub host: &'a dyn HostServices,
}

impl FixAllContext<'_> {
    /// Diagnostics of this context's category in `project`.
    pub fn project_diagnostics(&self, project: &ProjectId) -> Vec<Diagnostic> {
        self.of_category(self.diagnostics.project_diagnostics(project))
    }

    /// Diagnostics of this context's category in one unit.
    pub fn unit_diagnostics(&self, project: &ProjectId, unit: &UnitId) -> Vec<Diagnostic> {
        self.of_category(self.diagnostics.unit_diagnostics(project, unit))
    }

    /// Diagnostics of this context's category within `scope`.
    pub fn scope_diagnostics(&self) -> Vec<Diagnostic> {
        match self.scope {
            FixAllScope::Unit => self.unit_diagnostics(&self.unit.project, &self.unit.id),
            FixAllScope::Project => self.project_diagnostics(&self.unit.project),
            FixAllScope::Snapshot => self
                .snapshot
                .projects()
                .flat_map(|p| self.project_diagnostics(&p.id))
                .collect(),
        }
    }

    fn of_category(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        diagnostics
            .into_iter()
            .filter(|d| d.category == self.category)
            .collect()
    }
}

/// Concrete effect of a resolved action.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Replace the working snapshot with this one.
    ApplySnapshot(ProjectSnapshot),
    /// Ask the host to show a unit. Not consumed by the engine.
    OpenUnit(UnitId),
    /// Message for the user. Not consumed by the engine.
    Notify(String),
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::ApplySnapshot(_) => "apply_snapshot",
            Operation::OpenUnit(_) => "open_unit",
            Operation::Notify(_) => "notify",
        }
    }
}

type Resolver = Box<dyn FnOnce() -> anyhow::Result<Vec<Operation>> + Send>;

/// Deferred, named edit produced by a provider.
pub struct CodeAction {
    title: String,
    equivalence_key: Option<String>,
    resolver: Resolver,
}

impl CodeAction {
    pub fn new(
        title: impl Into<String>,
        resolver: impl FnOnce() -> anyhow::Result<Vec<Operation>> + Send + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            equivalence_key: None,
            resolver: Box::new(resolver),
        }
    }

    /// Action whose single operation swaps in `snapshot`.
    pub fn apply_snapshot(title: impl Into<String>, snapshot: ProjectSnapshot) -> Self {
        Self::new(title, move || Ok(vec![Operation::ApplySnapshot(snapshot)]))
    }

    /// Key grouping related actions; batch resolution uses it to pick the same kind of fix.
    pub fn with_equivalence_key(mut self, key: impl Into<String>) -> Self {
        self.equivalence_key = Some(key.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn equivalence_key(&self) -> Option<&str> {
        self.equivalence_key.as_deref()
    }

    pub fn resolve(self) -> anyhow::Result<Vec<Operation>> {
        (self.resolver)()
    }
}

impl fmt::Debug for CodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeAction")
            .field("title", &self.title)
            .field("equivalence_key", &self.equivalence_key)
            .finish_non_exhaustive()
    }
}
