//! Collaborator seams the engine is handed by its caller.
//!
//! Nothing here is global: cancellation, provider serialization and host
//! services are all injected, so tests and production share one contract.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Checked between edit applications, never in the middle of one.
pub trait Cancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared flag a caller can trip from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Cancellation for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Mutual-exclusion scope around provider invocations.
///
/// Providers that drive a non-reentrant external resource need every call
/// serialized, across engines. Callers opt in by handing the same
/// `InvocationLock::exclusive()` (or a clone of it) to each engine.
#[derive(Debug, Clone, Default)]
pub struct InvocationLock {
    inner: Option<Arc<Mutex<()>>>,
}

impl InvocationLock {
    /// No serialization.
    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn exclusive() -> Self {
        Self {
            inner: Some(Arc::new(Mutex::new(()))),
        }
    }

    /// Enter the scope. The guard releases it on drop.
    pub fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        // A provider that panicked while holding the lock leaves no state behind.
        self.inner
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    pub fn is_exclusive(&self) -> bool {
        self.inner.is_some()
    }
}

/// Optional host capabilities a provider may consult.
///
/// Every method has a default, so `NoopHostServices` is a complete
/// implementation for hosts that offer nothing.
pub trait HostServices: Send + Sync {
    /// Host option lookup (e.g. editor settings). `None` means "use your default".
    fn option(&self, _key: &str) -> Option<String> {
        None
    }

    /// Progress message, e.g. for a status bar. Ignored by default.
    fn progress(&self, _message: &str) {}
}

/// Host that offers no services.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHostServices;

impl HostServices for NoopHostServices {}

/// Host options backed by a map, typically the `[params]` config table.
#[derive(Debug, Clone, Default)]
pub struct OptionHostServices {
    options: BTreeMap<String, String>,
}

impl OptionHostServices {
    pub fn new(options: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            options: options.into_iter().collect(),
        }
    }
}

impl HostServices for OptionHostServices {
    fn option(&self, key: &str) -> Option<String> {
        self.options.get(key).cloned()
    }
}
