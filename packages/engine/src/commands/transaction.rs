//! Composite transaction command.

use jobstore_core::MonoTime;

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// An ordered list of boxed sub-commands, executed against the same state
/// as a single dispatcher write.
///
/// On error from any sub-command, execution of the remaining sub-commands
/// stops, but sub-commands already applied are **not** rolled back. This
/// is a deliberate throughput/simplicity tradeoff, not an oversight.
#[derive(Default)]
pub struct TransactionCommand {
    sub_commands: Vec<Box<dyn SubCommand>>,
}

impl TransactionCommand {
    /// Creates an empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sub-command to the end of the transaction.
    pub fn push(&mut self, sub_command: Box<dyn SubCommand>) {
        self.sub_commands.push(sub_command);
    }

    /// Number of accumulated sub-commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sub_commands.len()
    }

    /// Whether no sub-commands have been accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sub_commands.is_empty()
    }

    /// Runs every sub-command in order, stopping at the first error.
    ///
    /// Always returns the names of queues touched by sub-commands that did
    /// run, even when a later sub-command then failed -- an `AddToQueue`
    /// that already ran has permanently pushed into the queue engine (it is
    /// not part of `MemoryState` and so is never rolled back either), and a
    /// blocked `fetch()` waiter must still be woken for it.
    pub fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> (Vec<String>, Result<(), StorageError>) {
        let mut touched_queues = Vec::new();
        for sub_command in &mut self.sub_commands {
            if let Some(queue) = sub_command.touched_queue() {
                touched_queues.push(queue.to_string());
            }
            if let Err(err) = sub_command.execute(state, now) {
                return (touched_queues, Err(err));
            }
        }
        (touched_queues, Ok(()))
    }
}
