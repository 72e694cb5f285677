//! Queue-enqueue write sub-command.

use std::sync::Arc;

use jobstore_core::{JobId, MonoTime};

use crate::errors::StorageError;
use crate::queue_engine::QueueEngine;
use crate::state::MemoryState;

use super::SubCommand;

/// Appends `job_id` to the named queue, marking it for post-commit
/// signaling. The queue's FIFO itself lives in [`QueueEngine`], not
/// [`MemoryState`], so this holds a direct handle to it.
pub struct AddToQueue {
    /// Shared queue registry.
    pub queues: Arc<QueueEngine>,
    /// Target queue name.
    pub queue_name: String,
    /// Job to enqueue.
    pub job_id: JobId,
}

impl SubCommand for AddToQueue {
    fn execute(&mut self, _state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        self.queues.push(&self.queue_name, self.job_id);
        Ok(())
    }

    fn touched_queue(&self) -> Option<&str> {
        Some(&self.queue_name)
    }
}

/// A documented no-op: fetch has no invisibility timeout, so there is
/// nothing to return to a queue. Kept as a distinct type so the façade's
/// call surface stays uniform even though execution does nothing.
pub struct RemoveFromQueue {
    /// Target queue name, unused.
    pub queue_name: String,
    /// Job that would have been removed, unused.
    pub job_id: JobId,
}

impl SubCommand for RemoveFromQueue {
    fn execute(&mut self, _state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        let _ = (&self.queue_name, self.job_id);
        Ok(())
    }
}
