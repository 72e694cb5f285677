//! List write sub-commands.

use std::time::Duration;

use jobstore_core::MonoTime;

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// Prepends `value` to the list at `key`, creating it if absent.
pub struct PrependToList {
    /// Target list key.
    pub key: String,
    /// Value to prepend.
    pub value: String,
}

impl SubCommand for PrependToList {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        let entry = state.list_get_or_add(&self.key);
        entry.values.push_front(std::mem::take(&mut self.value));
        Ok(())
    }
}

/// Keeps only the `[start, stop]` inclusive zero-based index range of the
/// list at `key`, discarding the rest.
pub struct TrimList {
    /// Target list key.
    pub key: String,
    /// Inclusive start index to keep.
    pub start: usize,
    /// Inclusive end index to keep.
    pub stop: usize,
}

impl SubCommand for TrimList {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        if let Some(entry) = state.list_get(&self.key) {
            let kept: std::collections::VecDeque<String> = entry
                .values
                .iter()
                .enumerate()
                .filter(|(i, _)| *i >= self.start && *i <= self.stop)
                .map(|(_, v)| v.clone())
                .collect();
            state.list_get_or_add(&self.key).values = kept;
        }
        Ok(())
    }
}

/// Deletes the list at `key` entirely.
pub struct RemoveList {
    /// Target list key.
    pub key: String,
}

impl SubCommand for RemoveList {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        state.list_delete(&self.key);
        Ok(())
    }
}

/// Sets or clears a list's TTL.
pub struct ExpireList {
    /// Target list key.
    pub key: String,
    /// Requested TTL; `None` clears it.
    pub expire_in: Option<Duration>,
}

impl SubCommand for ExpireList {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.list_expire(&self.key, now, self.expire_in);
        Ok(())
    }
}
