//! The engine's single error type.

use jobstore_core::JobId;

/// Every fallible outcome the engine can produce.
///
/// Façades translate specific variants to `Option`/typed results; everything
/// else is surfaced directly to the embedding framework.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Malformed or missing input caught at a façade before a command is
    /// ever submitted to the dispatcher.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable description of what was wrong.
        message: String,
    },

    /// A parsed id does not exist. Most mutation commands degrade silently
    /// (no-op) instead of surfacing this; kept for reads that must
    /// distinguish "never existed" from "has no data".
    #[error("unknown job: {id}")]
    UnknownJob {
        /// The id that could not be resolved.
        id: JobId,
    },

    /// Lock acquisition did not complete within its timeout.
    #[error("lock timeout on resource {resource}")]
    LockTimeout {
        /// The resource name the caller tried to lock.
        resource: String,
    },

    /// A blocking queue fetch returned no job within its deadline.
    #[error("queue fetch timed out")]
    FetchTimeout,

    /// An internal index was found inconsistent. Indicates a bug, not a
    /// caller error; the command that observed it fails.
    #[error("invariant violation: {detail}")]
    InvariantViolation {
        /// What was found inconsistent.
        detail: String,
    },

    /// Any error surfaced from inside a read command or a write
    /// sub-command.
    #[error(transparent)]
    CommandException(#[from] anyhow::Error),
}
