//! Named, reentrant distributed lock (process-local despite the name).
//!
//! Locks never flow through the [`crate::dispatcher::Dispatcher`] -- that
//! would defeat the purpose of a low-latency mutual-exclusion primitive --
//! so this is the only shared-mutable state outside the dispatcher's
//! worker task. Reached directly from the connection façade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::errors::StorageError;

struct LockState {
    owner: Mutex<Option<String>>,
    depth: Mutex<u32>,
    notify: Notify,
}

impl LockState {
    fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            depth: Mutex::new(0),
            notify: Notify::new(),
        }
    }
}

/// Registry of named reentrant locks.
#[derive(Default)]
pub struct LockEngine {
    locks: DashMap<String, Arc<LockState>>,
}

impl LockEngine {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, resource: &str) -> Arc<LockState> {
        self.locks
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(LockState::new()))
            .clone()
    }

    /// Acquires `resource` for `owner`, blocking up to `timeout` if held by
    /// a different owner. Reentrant: repeated acquisition by the same
    /// owner increments depth and returns immediately.
    ///
    /// # Errors
    /// Returns [`StorageError::LockTimeout`] if the resource is not freed
    /// within `timeout`.
    pub async fn acquire(
        self: &Arc<Self>,
        resource: &str,
        owner: &str,
        timeout: Duration,
    ) -> Result<LockHandle, StorageError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let state = self.entry(resource);
            {
                let mut current_owner = state.owner.lock();
                let mut depth = state.depth.lock();
                if *depth == 0 {
                    *current_owner = Some(owner.to_string());
                    *depth = 1;
                    tracing::debug!(resource, owner, "lock acquired");
                    return Ok(LockHandle::new(self.clone(), resource.to_string(), owner.to_string()));
                }
                if current_owner.as_deref() == Some(owner) {
                    *depth += 1;
                    tracing::debug!(resource, owner, depth = *depth, "lock re-entered");
                    return Ok(LockHandle::new(self.clone(), resource.to_string(), owner.to_string()));
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                tracing::warn!(resource, owner, "lock acquisition timed out");
                return Err(StorageError::LockTimeout { resource: resource.to_string() });
            }
            let remaining = deadline - now;

            tokio::select! {
                () = state.notify.notified() => {}
                () = tokio::time::sleep(remaining) => {
                    return Err(StorageError::LockTimeout { resource: resource.to_string() });
                }
            }
        }
    }

    fn release(&self, resource: &str) {
        let Some(state) = self.locks.get(resource).map(|e| e.clone()) else {
            return;
        };
        let became_free = {
            let mut depth = state.depth.lock();
            if *depth > 0 {
                *depth -= 1;
            }
            *depth == 0
        };
        if became_free {
            *state.owner.lock() = None;
            state.notify.notify_one();
            // Only drop the map entry if nothing re-acquired it between the
            // depth check above and here (`remove_if` runs under the same
            // shard lock `entry()` uses, so the two never interleave).
            self.locks.remove_if(resource, |_, v| Arc::ptr_eq(v, &state) && *v.depth.lock() == 0);
            tracing::debug!(resource, "lock released and freed");
        }
    }
}

/// A held lock. Dropping without calling [`LockHandle::release`] leaks the
/// hold -- callers (the transaction façade) are expected to release
/// explicitly, typically on commit or drop of the owning transaction.
pub struct LockHandle {
    engine: Arc<LockEngine>,
    resource: String,
    /// The owner identity this handle was acquired under; exposed for
    /// diagnostics and tests.
    pub owner: String,
    released: AtomicBool,
}

impl LockHandle {
    fn new(engine: Arc<LockEngine>, resource: String, owner: String) -> Self {
        Self {
            engine,
            resource,
            owner,
            released: AtomicBool::new(false),
        }
    }

    /// Releases this hold. Idempotent: a second call is a no-op, guarded
    /// by an internal flag rather than by double-decrementing the shared
    /// depth counter.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.release(&self.resource);
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}
