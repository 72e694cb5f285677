//! Job write sub-commands.

use std::collections::BTreeMap;
use std::time::Duration;

use jobstore_core::{InvocationData, JobEntry, JobId, MonoTime, StateRecord};

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// Creates a job with a pre-minted id (ids are generated eagerly by the
/// façade via [`jobstore_core::JobIdProvider`] so callers can reference the
/// id before the transaction commits).
pub struct CreateJob {
    /// The id to create the job under.
    pub id: JobId,
    /// Opaque invocation payload.
    pub invocation_data: InvocationData,
    /// Initial parameters.
    pub parameters: BTreeMap<String, String>,
    /// Optional initial TTL.
    pub expire_in: Option<Duration>,
}

impl SubCommand for CreateJob {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        let mut entry = JobEntry::new(self.id, self.invocation_data.clone(), now);
        let comparer = state.comparer();
        entry.parameters =
            std::mem::take(&mut self.parameters).into_iter().map(|(k, v)| (comparer.normalize(&k), v)).collect();
        state.job_create(entry);
        if self.expire_in.is_some() {
            state.job_expire(self.id, now, self.expire_in);
        }
        Ok(())
    }
}

/// Sets a single job parameter.
pub struct SetJobParameter {
    /// Target job.
    pub id: JobId,
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: String,
}

impl SubCommand for SetJobParameter {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        state.job_add_parameter(self.id, self.name.clone(), self.value.clone());
        Ok(())
    }
}

/// Sets or clears a job's TTL.
pub struct ExpireJob {
    /// Target job.
    pub id: JobId,
    /// Requested TTL; `None` clears it.
    pub expire_in: Option<Duration>,
}

impl SubCommand for ExpireJob {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.job_expire(self.id, now, self.expire_in);
        Ok(())
    }
}

/// Clears a job's TTL. Equivalent to `ExpireJob { expire_in: None }`, kept
/// as a distinct type to mirror the façade's `persist_job` call name.
pub struct PersistJob {
    /// Target job.
    pub id: JobId,
}

impl SubCommand for PersistJob {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.job_expire(self.id, now, None);
        Ok(())
    }
}

/// Transitions a job to a new current state, recording it in history and
/// the job-state index.
pub struct SetJobState {
    /// Target job.
    pub id: JobId,
    /// State name.
    pub name: String,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// Arbitrary state data.
    pub data: BTreeMap<String, String>,
}

impl SubCommand for SetJobState {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.job_set_state(
            self.id,
            StateRecord {
                name: std::mem::take(&mut self.name),
                reason: self.reason.take(),
                created_at: now,
                data: std::mem::take(&mut self.data),
            },
        );
        Ok(())
    }
}

/// Appends a state record to history without changing the job's current
/// state (distinct from [`SetJobState`]).
pub struct AddJobState {
    /// Target job.
    pub id: JobId,
    /// State name.
    pub name: String,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// Arbitrary state data.
    pub data: BTreeMap<String, String>,
}

impl SubCommand for AddJobState {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.job_add_state(
            self.id,
            StateRecord {
                name: std::mem::take(&mut self.name),
                reason: self.reason.take(),
                created_at: now,
                data: std::mem::take(&mut self.data),
            },
        );
        Ok(())
    }
}
