//! Authoritative snapshot shared between concurrent readers and one committer.

use codefix_types::ProjectSnapshot;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Another writer committed after the caller read the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("snapshot conflict: expected version {expected}, found {actual}")]
pub struct SnapshotConflict {
    pub expected: u64,
    pub actual: u64,
}

/// Readers take an `Arc` of the current snapshot and are never affected by
/// later commits. Commits swap the whole snapshot at once.
#[derive(Debug, Default)]
pub struct SharedSnapshot {
    inner: RwLock<Arc<ProjectSnapshot>>,
}

impl SharedSnapshot {
    pub fn new(snapshot: ProjectSnapshot) -> Self {
        Self {
            inner: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<ProjectSnapshot> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn version(&self) -> u64 {
        self.current().version()
    }

    /// Replace the snapshot if it is still at `expected_version`.
    pub fn commit(
        &self,
        expected_version: u64,
        next: ProjectSnapshot,
    ) -> Result<Arc<ProjectSnapshot>, SnapshotConflict> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let actual = guard.version();
        if actual != expected_version {
            return Err(SnapshotConflict {
                expected: expected_version,
                actual,
            });
        }
        debug!(from = actual, to = next.version(), "commit snapshot");
        *guard = Arc::new(next);
        Ok(Arc::clone(&guard))
    }

    pub fn into_inner(self) -> Arc<ProjectSnapshot> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
