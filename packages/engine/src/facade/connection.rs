//! Connection façade: reads plus one-shot server bookkeeping.
//!
//! Mirrors the framework's notion of a storage "connection" -- short-lived,
//! cheap to construct, safe to use from many tasks concurrently since every
//! read goes through the dispatcher's mailbox rather than touching
//! `MemoryState` directly.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jobstore_core::{ClockAnchor, ClockSource, InvocationData, JobId, JobIdProvider, ServerContext};

use crate::commands::server::{AnnounceServer, Heartbeat, RemoveServer};
use crate::dispatcher::{submit_single, Dispatcher};
use crate::errors::StorageError;
use crate::lock_engine::{LockEngine, LockHandle};
use crate::queue_engine::QueueEngine;

use super::transaction::TransactionFacade;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// Full projection of one job, for callers that need the invocation payload
/// and parameters together (distinct from the monitoring façade's
/// dashboard-oriented `JobDetails`).
#[derive(Debug, Clone)]
pub struct JobData {
    /// Opaque invocation payload.
    pub invocation_data: InvocationData,
    /// Current state name, if any has been set.
    pub state_name: Option<String>,
    /// Creation time, as Unix-epoch millis.
    pub created_at_millis: i64,
    /// Job parameters.
    pub parameters: BTreeMap<String, String>,
}

/// Projection of a job's current state.
#[derive(Debug, Clone)]
pub struct StateData {
    /// State name.
    pub name: String,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// When this state was entered, as Unix-epoch millis.
    pub created_at_millis: i64,
    /// Arbitrary state data.
    pub data: BTreeMap<String, String>,
}

/// A job popped off a queue by [`StorageConnection::get_next_job_from_queues`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedJob {
    /// The queue the job was fetched from.
    pub queue_name: String,
    /// The fetched job's id.
    pub job_id: JobId,
}

/// The framework's storage connection: reads, server bookkeeping, lock
/// acquisition, blocking queue fetch, and transaction creation.
pub struct StorageConnection {
    dispatcher: Dispatcher,
    queues: Arc<QueueEngine>,
    locks: Arc<LockEngine>,
    clock: Arc<dyn ClockSource>,
    anchor: ClockAnchor,
    id_provider: Arc<JobIdProvider>,
    owner_id: String,
}

impl StorageConnection {
    /// Constructs a connection sharing the given dispatcher, queue engine,
    /// and lock engine. Each connection is assigned a unique owner identity
    /// used for lock reentrance.
    #[must_use]
    pub fn new(
        dispatcher: Dispatcher,
        queues: Arc<QueueEngine>,
        locks: Arc<LockEngine>,
        clock: Arc<dyn ClockSource>,
        anchor: ClockAnchor,
        id_provider: Arc<JobIdProvider>,
    ) -> Self {
        let owner_id = format!("conn-{}", NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        Self { dispatcher, queues, locks, clock, anchor, id_provider, owner_id }
    }

    /// Acquires a named distributed lock, reentrant for this connection.
    ///
    /// # Errors
    /// Returns [`StorageError::LockTimeout`] if not acquired within `timeout`.
    pub async fn acquire_distributed_lock(
        &self,
        resource: &str,
        timeout: Duration,
    ) -> Result<LockHandle, StorageError> {
        self.locks.acquire(resource, &self.owner_id, timeout).await
    }

    /// Fetches a job's invocation payload, creation time, and parameters.
    ///
    /// Unlike most reads here, this surfaces [`StorageError::UnknownJob`]
    /// rather than `None` on a missing job: invocation data is mandatory
    /// for every job that exists, so its absence always means the id
    /// never existed, never "exists but has no data".
    ///
    /// # Errors
    /// Returns [`StorageError::UnknownJob`] if `id` does not exist.
    pub async fn get_job_data(&self, id: JobId) -> Result<JobData, StorageError> {
        let anchor = self.anchor;
        self.dispatcher
            .submit_read(move |state, _now| {
                crate::state::require_job(state, id).map(|job| JobData {
                    invocation_data: job.invocation_data.clone(),
                    state_name: job.current_state_name().map(str::to_string),
                    created_at_millis: job.created_at.to_unix_millis(&anchor),
                    parameters: job.parameters.clone(),
                })
            })
            .await?
    }

    /// Fetches a job's current state, if any has been set.
    pub async fn get_state_data(&self, id: JobId) -> Option<StateData> {
        let anchor = self.anchor;
        self.read(move |state, _now| {
            let job = state.job_get(id)?;
            let current = job.current_state.as_ref()?;
            Some(StateData {
                name: current.name.clone(),
                reason: current.reason.clone(),
                created_at_millis: current.created_at.to_unix_millis(&anchor),
                data: current.data.clone(),
            })
        })
        .await
    }

    /// Fetches a single job parameter.
    pub async fn get_job_parameter(&self, id: JobId, name: &str) -> Option<String> {
        let name = name.to_string();
        self.read(move |state, _now| {
            let name = state.comparer().normalize(&name);
            state.job_get(id)?.parameters.get(&name).cloned()
        })
        .await
    }

    /// Returns all fields of the hash at `key`, or `None` if it does not exist.
    pub async fn hash_all(&self, key: &str) -> Option<BTreeMap<String, String>> {
        let key = key.to_string();
        self.read(move |state, _now| state.hash_get(&key).map(|h| h.fields.clone()))
            .await
    }

    /// Returns a single field's value from the hash at `key`.
    pub async fn hash_get_field(&self, key: &str, field: &str) -> Option<String> {
        let key = key.to_string();
        let field = field.to_string();
        self.read(move |state, _now| {
            let field = state.comparer().normalize(&field);
            state.hash_get(&key)?.fields.get(&field).cloned()
        })
        .await
    }

    /// Returns the `[start, stop]` inclusive range of the list at `key`.
    pub async fn list_range(&self, key: &str, start: usize, stop: usize) -> Vec<String> {
        let key = key.to_string();
        self.read(move |state, _now| {
            Some(
                state
                    .list_get(&key)
                    .map(|l| {
                        l.values
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i >= start && *i <= stop)
                            .map(|(_, v)| v.clone())
                            .collect()
                    })
                    .unwrap_or_default(),
            )
        })
        .await
        .unwrap_or_default()
    }

    /// Number of values in the list at `key`.
    pub async fn list_len(&self, key: &str) -> usize {
        let key = key.to_string();
        self.read(move |state, _now| Some(state.list_get(&key).map_or(0, |l| l.values.len())))
            .await
            .unwrap_or(0)
    }

    /// Returns the `[start, stop]` inclusive rank range of the sorted set
    /// at `key`, in score-ascending order.
    pub async fn set_range(&self, key: &str, start: usize, stop: usize) -> Vec<(String, f64)> {
        let key = key.to_string();
        self.read(move |state, _now| {
            Some(state.set_get(&key).map(|s| s.range_by_rank(start, stop)).unwrap_or_default())
        })
        .await
        .unwrap_or_default()
    }

    /// Looks up a member's score in the sorted set at `key`.
    pub async fn set_score(&self, key: &str, value: &str) -> Option<f64> {
        let key = key.to_string();
        let value = value.to_string();
        self.read(move |state, _now| {
            let value = state.normalize_set_value(&value);
            state.set_get(&key)?.score_of(&value)
        })
        .await
    }

    /// Number of members in the sorted set at `key`.
    pub async fn set_len(&self, key: &str) -> usize {
        let key = key.to_string();
        self.read(move |state, _now| Some(state.set_get(&key).map_or(0, |s| s.len())))
            .await
            .unwrap_or(0)
    }

    /// Current value of the counter at `key`.
    pub async fn counter_value(&self, key: &str) -> Option<i64> {
        let key = key.to_string();
        self.read(move |state, _now| state.counter_get(&key).map(|c| c.value))
            .await
    }

    /// Registers this server with the given context.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn announce_server(&self, server_id: &str, context: ServerContext) -> Result<(), StorageError> {
        submit_single(
            &self.dispatcher,
            Box::new(AnnounceServer { server_id: server_id.to_string(), context }),
        )
        .await
    }

    /// Removes this server's registration.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn remove_server(&self, server_id: &str) -> Result<(), StorageError> {
        submit_single(&self.dispatcher, Box::new(RemoveServer { server_id: server_id.to_string() })).await
    }

    /// Records a heartbeat for this server.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn heartbeat(&self, server_id: &str) -> Result<(), StorageError> {
        submit_single(&self.dispatcher, Box::new(Heartbeat { server_id: server_id.to_string() })).await
    }

    /// Blocks (up to `timeout`) for the next job across `queue_names`,
    /// presented in a randomized order per call for cross-queue fairness.
    /// Reaches the queue engine directly -- this never flows through the
    /// dispatcher.
    ///
    /// # Errors
    /// Returns [`StorageError::FetchTimeout`] if no job arrives in time.
    pub async fn get_next_job_from_queues(
        &self,
        queue_names: &[String],
        timeout: Duration,
    ) -> Result<FetchedJob, StorageError> {
        let (queue_name, job_id) = self.queues.fetch(queue_names, timeout).await?;
        Ok(FetchedJob { queue_name, job_id })
    }

    /// Starts a new transaction sharing this connection's dispatcher, queue
    /// engine, lock engine, and id provider, but its own lock-owner identity.
    #[must_use]
    pub fn create_transaction(&self) -> TransactionFacade {
        TransactionFacade::new(
            self.dispatcher.clone(),
            self.queues.clone(),
            self.locks.clone(),
            self.id_provider.clone(),
        )
    }

    /// The clock this connection's engine was constructed with, exposed so
    /// callers can compute "now" for comparison against millisecond-stamped
    /// projections without going through the dispatcher.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn ClockSource> {
        &self.clock
    }

    async fn read<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&crate::state::MemoryState, jobstore_core::MonoTime) -> Option<T> + Send + 'static,
    {
        match self.dispatcher.submit_read(f).await {
            Ok(value) => value,
            Err(error) => {
                tracing::error!(%error, "connection read failed");
                None
            }
        }
    }
}
