//! FIFO per named queue, with blocking fetch and cross-queue fairness.
//!
//! Queue content lives here, not in [`crate::state::MemoryState`]: waiters
//! are `tokio::sync::Notify`-based primitives that must never be touched
//! from inside the dispatcher's single-threaded command execution. A write
//! command appends directly into a queue's FIFO (through the `Arc` it was
//! constructed with) and the dispatcher signals post-commit; the blocking
//! fetch path is reached directly from the connection façade.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use jobstore_core::{JobId, StringComparer};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::sync::Notify;

use crate::errors::StorageError;

struct QueueState {
    fifo: Mutex<VecDeque<JobId>>,
    notify: Notify,
}

impl QueueState {
    fn new() -> Self {
        Self {
            fifo: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// Shared, thread-safe FIFO queue registry.
pub struct QueueEngine {
    queues: DashMap<String, Arc<QueueState>>,
    comparer: StringComparer,
}

impl Default for QueueEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueEngine {
    /// Creates an empty registry under the default (case-sensitive) comparer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparer(StringComparer::default())
    }

    /// Creates an empty registry, normalizing queue names under `comparer`.
    #[must_use]
    pub fn with_comparer(comparer: StringComparer) -> Self {
        Self { queues: DashMap::new(), comparer }
    }

    fn queue(&self, name: &str) -> Arc<QueueState> {
        let name = self.comparer.normalize(name);
        self.queues
            .entry(name)
            .or_insert_with(|| Arc::new(QueueState::new()))
            .clone()
    }

    /// Appends `job` to the end of `queue`'s FIFO. Called from inside a
    /// write command's execution.
    pub fn push(&self, queue: &str, job: JobId) {
        self.queue(queue).fifo.lock().push_back(job);
    }

    /// Wakes at most one waiter on `queue`, to avoid a thundering herd.
    pub fn signal_one(&self, queue: &str) {
        if let Some(state) = self.queues.get(&self.comparer.normalize(queue)) {
            state.notify.notify_one();
        }
    }

    /// Non-blocking attempt to pop the head of `queue`.
    fn try_pop(&self, queue: &str) -> Option<JobId> {
        self.queue(queue).fifo.lock().pop_front()
    }

    /// Snapshot of `queue`'s current contents, head first. Non-destructive;
    /// used only by monitoring projections.
    #[must_use]
    pub fn contents(&self, queue: &str) -> Vec<JobId> {
        self.queue(queue).fifo.lock().iter().copied().collect()
    }

    /// Blocking fetch across several queues, presented in a randomized
    /// order per call for cross-queue fairness.
    ///
    /// First tries a non-blocking poll of every queue in that order; if all
    /// are empty, waits up to `timeout` for a signal on any of them, then
    /// retries the poll. Returns the queue name and the job popped.
    ///
    /// # Errors
    /// Returns [`StorageError::FetchTimeout`] if no job arrives in time.
    pub async fn fetch(
        &self,
        queue_names: &[String],
        timeout: Duration,
    ) -> Result<(String, JobId), StorageError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let mut order: Vec<&String> = queue_names.iter().collect();
            order.shuffle(&mut rand::rng());

            for name in &order {
                if let Some(job) = self.try_pop(name) {
                    return Ok(((*name).clone(), job));
                }
            }

            let notifies: Vec<_> = queue_names
                .iter()
                .map(|name| self.queue(name))
                .collect();

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(StorageError::FetchTimeout);
            }
            let remaining = deadline - now;

            let wait = async {
                let futures: Vec<_> = notifies.iter().map(|s| s.notify.notified()).collect();
                select_any_notified(futures).await;
            };

            tokio::select! {
                () = wait => {}
                () = tokio::time::sleep(remaining) => {
                    return Err(StorageError::FetchTimeout);
                }
            }
        }
    }
}

/// Resolves as soon as any one of several `Notify::notified()` futures
/// resolves. A hand-rolled `select_all` so the queue engine does not need
/// an extra `futures` dependency just for this.
async fn select_any_notified(futures: Vec<tokio::sync::futures::Notified<'_>>) {
    use std::future::Future;
    use std::pin::Pin;

    let mut pinned: Vec<Pin<Box<dyn Future<Output = ()> + Send + '_>>> =
        futures.into_iter().map(|f| Box::pin(f) as Pin<Box<dyn Future<Output = ()> + Send + '_>>).collect();

    std::future::poll_fn(move |cx| {
        for fut in &mut pinned {
            if fut.as_mut().poll(cx).is_ready() {
                return std::task::Poll::Ready(());
            }
        }
        std::task::Poll::Pending
    })
    .await;
}
