//! Shutdown hook registry
//!
//! Holds pending auto-eject callbacks. The host application owns the
//! registry (usually through [`Mounter::shutdown_hooks`](crate::Mounter::shutdown_hooks))
//! and calls [`ShutdownHooks::drain_and_run_all`] once from its shutdown
//! sequence.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use crate::error::MountError;

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), MountError>> + Send>;

/// Identifies a registered hook so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

/// Thread-safe set of one-shot async callbacks run at shutdown.
#[derive(Default)]
pub struct ShutdownHooks {
    next_id: AtomicU64,
    hooks: Mutex<BTreeMap<HookId, Hook>>,
}

impl fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("pending", &self.len())
            .finish_non_exhaustive()
    }
}

impl ShutdownHooks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<HookId, Hook>> {
        // Hooks are only inserted or removed under the lock, so a poisoned
        // map is still consistent.
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a callback to run at shutdown.
    pub fn register<F, Fut>(&self, hook: F) -> HookId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), MountError>> + Send + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, Box::new(move || hook().boxed()));
        id
    }

    /// Remove a callback. Returns false if it was already gone.
    pub fn unregister(&self, id: HookId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Number of callbacks still pending.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Run every pending callback exactly once and clear the registry.
    ///
    /// The pending set is snapshotted and cleared before anything runs, so
    /// callbacks registered while the drain is in progress are left for a
    /// later drain. Callbacks run concurrently and each outcome is reported
    /// on its own; one failure does not stop the others.
    pub async fn drain_and_run_all(&self) -> Vec<(HookId, Result<(), MountError>)> {
        let pending = std::mem::take(&mut *self.lock());
        if pending.is_empty() {
            return Vec::new();
        }

        tracing::debug!("Running {} shutdown hook(s)", pending.len());
        let results = join_all(
            pending
                .into_iter()
                .map(|(id, hook)| async move { (id, hook().await) }),
        )
        .await;

        for (id, result) in &results {
            if let Err(e) = result {
                tracing::warn!("Shutdown hook {:?} failed: {}", id, e);
            }
        }
        results
    }
}
