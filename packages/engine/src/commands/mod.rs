//! Unit-of-work objects executed by the dispatcher against [`MemoryState`].
//!
//! Write operations are reified as [`SubCommand`] objects so a composite
//! [`transaction::TransactionCommand`] can hold an ordered, boxed list of
//! them and run them against the same state without rollback on error.
//! Read and monitoring operations have no such composability requirement;
//! they are submitted to the dispatcher as plain closures (see
//! [`crate::dispatcher::Dispatcher::submit_read`]).

pub mod counter;
pub mod hash;
pub mod jobs;
pub mod list;
pub mod monitoring;
pub mod queue;
pub mod server;
pub mod sorted_set;
pub mod transaction;

use jobstore_core::MonoTime;

use crate::errors::StorageError;
use crate::state::MemoryState;

/// A single reified write operation.
///
/// `execute` may mutate `state` freely; on error, a containing transaction
/// does not undo earlier sub-commands.
pub trait SubCommand: Send {
    /// Runs the operation against `state`, observing `now` for any TTL math.
    ///
    /// # Errors
    /// Returns [`StorageError`] if the operation is invalid against the
    /// current state (e.g. an unparseable queue entry, an invariant check).
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError>;

    /// The queue this sub-command enqueued into, if any -- used by the
    /// dispatcher to decide which queues to signal post-commit.
    fn touched_queue(&self) -> Option<&str> {
        None
    }
}
