//! Fix application engine.
//!
//! This crate owns *how* a category of diagnostics is turned into a new
//! snapshot: probing a provider's batch capability, routing to the batch or
//! sequential fallback strategy, and threading the snapshot through a pass.
//! Loading projects and analysis, iterating passes and writing results is the
//! `codefix-core` crate's job.

mod batch;
mod capability;
mod engine;
mod fallback;
mod index;
mod policy;
mod ports;
mod provider;
mod providers;

pub use capability::Capability;
pub use engine::{
    CategorySummary, Engine, EngineError, EngineResult, Outcome, PassReport, SkipReason,
};
pub use index::{DiagnosticIndex, DiagnosticSource};
pub use policy::{FallbackPolicy, FallbackRule};
pub use ports::{
    CancelFlag, Cancellation, HostServices, InvocationLock, NeverCancel, NoopHostServices,
    OptionHostServices,
};
pub use provider::{
    BatchSupport, CodeAction, FixAllContext, FixAllScope, FixContext, FixProvider, Operation,
};
pub use providers::{
    PrivateFieldNamingProvider, ProviderMeta, SuggestedEditProvider, TrailingWhitespaceProvider,
    builtin_provider_metas, builtin_providers,
};
