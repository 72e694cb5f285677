//! Job entry and state-record types.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::clock::MonoTime;
use crate::ids::JobId;

/// Opaque user payload carried by a job. Never interpreted by this crate --
/// the surrounding framework owns serialization of the invocation itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationData {
    /// Framework-defined discriminator (e.g. a method or type name), used
    /// only for monitoring display.
    pub type_tag: String,
    /// Raw serialized payload bytes.
    pub payload: Vec<u8>,
}

/// A single recorded state transition.
#[derive(Debug, Clone)]
pub struct StateRecord {
    /// State name (e.g. `"Enqueued"`, `"Processing"`, `"Succeeded"`).
    pub name: String,
    /// Optional human-readable reason for the transition.
    pub reason: Option<String>,
    /// When this state was entered.
    pub created_at: MonoTime,
    /// Arbitrary string data attached to the transition.
    pub data: BTreeMap<String, String>,
}

/// A job and its full lifecycle history.
#[derive(Debug, Clone)]
pub struct JobEntry {
    /// Unique identifier.
    pub id: JobId,
    /// Opaque invocation payload.
    pub invocation_data: InvocationData,
    /// Creation time.
    pub created_at: MonoTime,
    /// Absolute expiration time, if any.
    pub expire_at: Option<MonoTime>,
    /// The most recent state, if any has been set.
    pub current_state: Option<StateRecord>,
    /// Bounded history of past states, most recent first.
    pub state_history: VecDeque<StateRecord>,
    /// User/framework-set parameters.
    pub parameters: BTreeMap<String, String>,
}

impl JobEntry {
    /// Creates a freshly-created job with no state yet.
    #[must_use]
    pub fn new(id: JobId, invocation_data: InvocationData, created_at: MonoTime) -> Self {
        Self {
            id,
            invocation_data,
            created_at,
            expire_at: None,
            current_state: None,
            state_history: VecDeque::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Pushes a new state record to the front of history and makes it
    /// current, trimming history down to `max_history_length`.
    ///
    /// Maintains the invariant that `current_state`, when present, is
    /// exactly the record at the head of `state_history`.
    pub fn push_state(&mut self, record: StateRecord, max_history_length: usize) {
        self.state_history.push_front(record.clone());
        while self.state_history.len() > max_history_length {
            self.state_history.pop_back();
        }
        self.current_state = Some(record);
    }

    /// The current state's name, if any.
    #[must_use]
    pub fn current_state_name(&self) -> Option<&str> {
        self.current_state.as_ref().map(|s| s.name.as_str())
    }
}
