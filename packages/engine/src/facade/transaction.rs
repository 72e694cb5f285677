//! Transaction façade: accumulates sub-commands and commits them as one
//! atomic dispatcher write.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jobstore_core::{InvocationData, JobId, JobIdProvider, ServerContext};

use crate::commands::counter::IncrementCounter;
use crate::commands::hash::{ExpireHash, RemoveHash, SetHashFields};
use crate::commands::jobs::{AddJobState, CreateJob, ExpireJob, PersistJob, SetJobParameter, SetJobState};
use crate::commands::list::{ExpireList, PrependToList, RemoveList, TrimList};
use crate::commands::queue::{AddToQueue, RemoveFromQueue};
use crate::commands::sorted_set::{AddToSet, ExpireSet, RemoveFromSet, RemoveSet};
use crate::commands::transaction::TransactionCommand;
use crate::dispatcher::Dispatcher;
use crate::errors::StorageError;
use crate::lock_engine::{LockEngine, LockHandle};
use crate::queue_engine::QueueEngine;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(0);

/// A single framework-visible unit of work: a sequence of sub-commands that
/// commit together as one dispatcher write.
///
/// Locks acquired through [`Self::acquire_lock`] are tracked in `held_locks`
/// and released when the transaction is dropped, committed or not -- an
/// uncommitted transaction's locks are released on drop without ever having
/// protected anything, which is deliberate: dropping a non-committed
/// transaction releases any locks acquired through it.
pub struct TransactionFacade {
    dispatcher: Dispatcher,
    queues: Arc<QueueEngine>,
    locks: Arc<LockEngine>,
    id_provider: Arc<JobIdProvider>,
    owner_id: String,
    txn: TransactionCommand,
    held_locks: Vec<LockHandle>,
}

impl TransactionFacade {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        queues: Arc<QueueEngine>,
        locks: Arc<LockEngine>,
        id_provider: Arc<JobIdProvider>,
    ) -> Self {
        let owner_id = format!("txn-{}", NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            dispatcher,
            queues,
            locks,
            id_provider,
            owner_id,
            txn: TransactionCommand::new(),
            held_locks: Vec::new(),
        }
    }

    /// Acquires a named lock under this transaction's own owner identity,
    /// holding it until the transaction is dropped or committed.
    ///
    /// # Errors
    /// Returns [`StorageError::LockTimeout`] if not acquired within `timeout`.
    pub async fn acquire_lock(&mut self, resource: &str, timeout: Duration) -> Result<(), StorageError> {
        let handle = self.locks.acquire(resource, &self.owner_id, timeout).await?;
        self.held_locks.push(handle);
        Ok(())
    }

    /// Mints a fresh id and queues a job creation. The id is returned
    /// immediately, before `commit()`, so callers can reference it inside
    /// the same transaction (e.g. `add_to_queue`).
    pub fn create_job(
        &mut self,
        invocation_data: InvocationData,
        parameters: BTreeMap<String, String>,
        expire_in: Option<Duration>,
    ) -> JobId {
        let id = self.id_provider.next();
        self.txn.push(Box::new(CreateJob { id, invocation_data, parameters, expire_in }));
        id
    }

    /// Queues setting a single job parameter.
    pub fn set_job_parameter(&mut self, id: JobId, name: String, value: String) {
        self.txn.push(Box::new(SetJobParameter { id, name, value }));
    }

    /// Queues setting or clearing a job's TTL.
    pub fn expire_job(&mut self, id: JobId, expire_in: Option<Duration>) {
        self.txn.push(Box::new(ExpireJob { id, expire_in }));
    }

    /// Queues clearing a job's TTL.
    pub fn persist_job(&mut self, id: JobId) {
        self.txn.push(Box::new(PersistJob { id }));
    }

    /// Queues a job-state transition.
    pub fn set_job_state(&mut self, id: JobId, name: String, reason: Option<String>, data: BTreeMap<String, String>) {
        self.txn.push(Box::new(SetJobState { id, name, reason, data }));
    }

    /// Queues a history-only state append that does not change the job's
    /// current state.
    pub fn add_job_state(&mut self, id: JobId, name: String, reason: Option<String>, data: BTreeMap<String, String>) {
        self.txn.push(Box::new(AddJobState { id, name, reason, data }));
    }

    /// Queues enqueuing `job_id` onto `queue_name`.
    pub fn add_to_queue(&mut self, queue_name: String, job_id: JobId) {
        self.txn.push(Box::new(AddToQueue { queues: self.queues.clone(), queue_name, job_id }));
    }

    /// Queues a (no-op) dequeue-rollback. See [`RemoveFromQueue`] for why.
    pub fn remove_from_queue(&mut self, queue_name: String, job_id: JobId) {
        self.txn.push(Box::new(RemoveFromQueue { queue_name, job_id }));
    }

    /// Queues incrementing (or, with a negative `by`, decrementing) a
    /// counter, with an optional TTL applied in the same step.
    pub fn increment_counter(&mut self, key: String, by: i64, expire_in: Option<Duration>) {
        self.txn.push(Box::new(IncrementCounter { key, by, expire_in }));
    }

    /// Queues merging `fields` into the hash at `key`.
    pub fn set_hash_fields(&mut self, key: String, fields: BTreeMap<String, String>) {
        self.txn.push(Box::new(SetHashFields { key, fields }));
    }

    /// Queues deleting the hash at `key`.
    pub fn remove_hash(&mut self, key: String) {
        self.txn.push(Box::new(RemoveHash { key }));
    }

    /// Queues setting or clearing a hash's TTL.
    pub fn expire_hash(&mut self, key: String, expire_in: Option<Duration>) {
        self.txn.push(Box::new(ExpireHash { key, expire_in }));
    }

    /// Queues prepending `value` onto the list at `key`.
    pub fn prepend_to_list(&mut self, key: String, value: String) {
        self.txn.push(Box::new(PrependToList { key, value }));
    }

    /// Queues trimming the list at `key` to `[start, stop]`.
    pub fn trim_list(&mut self, key: String, start: usize, stop: usize) {
        self.txn.push(Box::new(TrimList { key, start, stop }));
    }

    /// Queues deleting the list at `key`.
    pub fn remove_list(&mut self, key: String) {
        self.txn.push(Box::new(RemoveList { key }));
    }

    /// Queues setting or clearing a list's TTL.
    pub fn expire_list(&mut self, key: String, expire_in: Option<Duration>) {
        self.txn.push(Box::new(ExpireList { key, expire_in }));
    }

    /// Queues inserting or updating `value` at `score` in the sorted set at `key`.
    pub fn add_to_set(&mut self, key: String, value: String, score: f64) {
        self.txn.push(Box::new(AddToSet { key, value, score }));
    }

    /// Queues removing a single member from the sorted set at `key`.
    pub fn remove_from_set(&mut self, key: String, value: String) {
        self.txn.push(Box::new(RemoveFromSet { key, value }));
    }

    /// Queues deleting the sorted set at `key`.
    pub fn remove_set(&mut self, key: String) {
        self.txn.push(Box::new(RemoveSet { key }));
    }

    /// Queues setting or clearing a sorted set's TTL.
    pub fn expire_set(&mut self, key: String, expire_in: Option<Duration>) {
        self.txn.push(Box::new(ExpireSet { key, expire_in }));
    }

    /// Number of sub-commands accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.txn.len()
    }

    /// Whether no sub-commands have been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.txn.is_empty()
    }

    /// Commits every accumulated sub-command as one atomic dispatcher write.
    /// On error from any sub-command, earlier sub-commands remain applied --
    /// this is a deliberate no-rollback design, not a bug.
    ///
    /// # Errors
    /// Returns the first sub-command's error, if any.
    pub async fn commit(mut self) -> Result<(), StorageError> {
        let txn = std::mem::take(&mut self.txn);
        self.dispatcher.submit_transaction(txn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use jobstore_core::SystemMonoClock;

    fn facade() -> TransactionFacade {
        let queues = Arc::new(QueueEngine::new());
        let dispatcher = Dispatcher::spawn(EngineConfig::default(), Arc::new(SystemMonoClock), queues.clone());
        TransactionFacade::new(
            dispatcher,
            queues,
            Arc::new(LockEngine::new()),
            Arc::new(JobIdProvider::new(1)),
        )
    }

    #[tokio::test]
    async fn create_enqueue_commit_lands_job_in_queue() {
        let mut txn = facade();
        let id = txn.create_job(
            InvocationData { type_tag: "T".to_string(), payload: vec![] },
            BTreeMap::from([("k".to_string(), "v".to_string())]),
            Some(Duration::from_secs(3600)),
        );
        txn.set_job_state(id, "Enqueued".to_string(), None, BTreeMap::new());
        let queues = txn.queues.clone();
        txn.add_to_queue("default".to_string(), id);
        txn.commit().await.unwrap();

        let (queue, fetched) = queues.fetch(&["default".to_string()], Duration::from_millis(50)).await.unwrap();
        assert_eq!(queue, "default");
        assert_eq!(fetched, id);
    }

    #[tokio::test]
    async fn uncommitted_transaction_releases_locks_on_drop() {
        let locks = Arc::new(LockEngine::new());
        {
            let mut txn = facade();
            txn.locks = locks.clone();
            txn.acquire_lock("r", Duration::from_secs(1)).await.unwrap();
        }
        let reacquired = locks.acquire("r", "someone-else", Duration::from_millis(50)).await;
        assert!(reacquired.is_ok());
    }
}
