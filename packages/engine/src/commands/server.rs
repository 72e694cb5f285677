//! Server-registration write sub-commands.
//!
//! Issued directly by [`crate::facade::connection::StorageConnection`]
//! rather than through a transaction -- server bookkeeping is not part of
//! the job-processing write catalog.

use jobstore_core::{MonoTime, ServerContext};

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// Registers or re-registers a server.
pub struct AnnounceServer {
    /// Caller-chosen unique server id.
    pub server_id: String,
    /// Static context reported at registration.
    pub context: ServerContext,
}

impl SubCommand for AnnounceServer {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.server_add(
            std::mem::take(&mut self.server_id),
            std::mem::replace(&mut self.context, ServerContext { worker_count: 0, queues: Vec::new() }),
            now,
        );
        Ok(())
    }
}

/// Removes a server registration.
pub struct RemoveServer {
    /// Server id to remove.
    pub server_id: String,
}

impl SubCommand for RemoveServer {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        state.server_remove(&self.server_id);
        Ok(())
    }
}

/// Records a heartbeat for a registered server.
pub struct Heartbeat {
    /// Server id to touch.
    pub server_id: String,
}

impl SubCommand for Heartbeat {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.server_heartbeat(&self.server_id, now);
        Ok(())
    }
}
