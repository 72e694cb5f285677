//! Single-writer dispatcher: serializes every read and write against one
//! [`MemoryState`], owned exclusively by its worker task.
//!
//! Mirrors this codebase's `BackgroundWorker<T>` pattern (an mpsc mailbox
//! feeding a dedicated task), generalized to a boxed command envelope
//! instead of a placeholder type parameter.

use std::sync::Arc;
use std::time::Duration;

use jobstore_core::{ClockSource, MonoTime};
use tokio::sync::{mpsc, oneshot};

use crate::commands::transaction::TransactionCommand;
use crate::commands::SubCommand;
use crate::config::EngineConfig;
use crate::errors::StorageError;
use crate::queue_engine::QueueEngine;
use crate::state::MemoryState;

type BoxedRead = Box<dyn FnOnce(&MemoryState, MonoTime) + Send>;
type BoxedWrite = Box<dyn FnOnce(&mut MemoryState, MonoTime) -> Vec<String> + Send>;

enum Envelope {
    Read(BoxedRead),
    Write(BoxedWrite),
}

/// A handle submitters use to hand commands to the dispatcher's worker task.
///
/// Cloning is cheap (wraps an `mpsc::Sender`); every clone feeds the same
/// single worker.
#[derive(Clone)]
pub struct Dispatcher {
    mailbox: mpsc::UnboundedSender<Envelope>,
    queues: Arc<QueueEngine>,
    command_timeout: Duration,
}

impl Dispatcher {
    /// Spawns the worker task and returns a handle to it.
    ///
    /// `clock` drives both the timestamps attached to commands and the
    /// periodic eviction tick; `queues` is shared with the caller so the
    /// connection façade can reach the blocking-fetch path directly,
    /// bypassing the dispatcher -- queue waits never flow through the
    /// single writer.
    #[must_use]
    pub fn spawn(config: EngineConfig, clock: Arc<dyn ClockSource>, queues: Arc<QueueEngine>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let command_timeout = config.command_timeout;
        let eviction_interval = config.eviction_interval;
        let worker_queues = queues.clone();

        tokio::spawn(run_worker(rx, config, clock, worker_queues, eviction_interval));

        Self {
            mailbox: tx,
            queues,
            command_timeout,
        }
    }

    /// Shared handle to the queue engine, for façades that need to reach
    /// the blocking-fetch path directly.
    #[must_use]
    pub fn queues(&self) -> Arc<QueueEngine> {
        self.queues.clone()
    }

    /// Submits a read-only closure, returning its result once the worker
    /// has executed it in program order relative to prior writes.
    ///
    /// # Errors
    /// Returns [`StorageError::CommandException`] if the dispatcher has
    /// shut down, or a timeout-derived error if the mailbox never drains
    /// within `command_timeout`.
    pub async fn submit_read<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryState, MonoTime) -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope::Read(Box::new(move |state, now| {
            let _ = reply_tx.send(f(state, now));
        }));
        self.send_and_await(envelope, reply_rx).await
    }

    /// Submits a single write sub-command, returning the sub-command's
    /// output via a side channel captured in the closure.
    ///
    /// # Errors
    /// See [`Self::submit_read`].
    pub async fn submit_write<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut MemoryState, MonoTime) -> (T, Vec<String>) + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope::Write(Box::new(move |state, now| {
            let (value, touched) = f(state, now);
            let _ = reply_tx.send(value);
            touched
        }));
        self.send_and_await(envelope, reply_rx).await
    }

    /// Submits a composite transaction, running every accumulated
    /// sub-command in order against the same state.
    ///
    /// # Errors
    /// Returns the first sub-command's error, if any. Sub-commands
    /// already applied before the failing one are not rolled back.
    pub async fn submit_transaction(&self, mut txn: TransactionCommand) -> Result<(), StorageError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope::Write(Box::new(move |state, now| {
            let (touched, result) = txn.execute(state, now);
            let _ = reply_tx.send(result);
            touched
        }));
        self.send_and_await(envelope, reply_rx).await?
    }

    async fn send_and_await<T: Send + 'static>(
        &self,
        envelope: Envelope,
        reply_rx: oneshot::Receiver<T>,
    ) -> Result<T, StorageError> {
        self.mailbox.send(envelope).map_err(|_| StorageError::InvariantViolation {
            detail: "dispatcher worker is no longer running".to_string(),
        })?;

        match tokio::time::timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(StorageError::InvariantViolation {
                detail: "dispatcher dropped a command without replying".to_string(),
            }),
            Err(_) => Err(StorageError::InvariantViolation {
                detail: "dispatcher did not respond within command_timeout".to_string(),
            }),
        }
    }
}

/// A boxed sub-command paired with a one-shot reply, for callers that
/// submit a single reified [`SubCommand`] rather than a closure. Used by
/// façades that already build `Box<dyn SubCommand>` values for the
/// transaction catalog and want the single-sub-command case to share the
/// same code path.
pub async fn submit_single(
    dispatcher: &Dispatcher,
    mut command: Box<dyn SubCommand>,
) -> Result<(), StorageError> {
    dispatcher
        .submit_write(move |state, now| {
            let result = command.execute(state, now);
            let touched = command.touched_queue().map(str::to_string).into_iter().collect();
            (result, touched)
        })
        .await?
}

async fn run_worker(
    mut mailbox: mpsc::UnboundedReceiver<Envelope>,
    config: EngineConfig,
    clock: Arc<dyn ClockSource>,
    queues: Arc<QueueEngine>,
    eviction_interval: Duration,
) {
    let mut state = MemoryState::new(config);
    let mut ticker = tokio::time::interval(eviction_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            envelope = mailbox.recv() => {
                let Some(envelope) = envelope else {
                    tracing::debug!("dispatcher mailbox closed, worker exiting");
                    break;
                };
                let now = clock.now();
                match envelope {
                    Envelope::Read(f) => f(&state, now),
                    Envelope::Write(f) => {
                        let touched = f(&mut state, now);
                        for queue in touched {
                            queues.signal_one(&queue);
                        }
                    }
                }
            }
            _ = ticker.tick() => {
                let now = clock.now();
                let evicted = state.evict_expired_entries(now);
                if evicted > 0 {
                    tracing::debug!(evicted, "eviction sweep removed expired entries");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobstore_core::SystemMonoClock;

    fn spawn_dispatcher() -> Dispatcher {
        Dispatcher::spawn(
            EngineConfig::default(),
            Arc::new(SystemMonoClock),
            Arc::new(QueueEngine::new()),
        )
    }

    #[tokio::test]
    async fn submit_write_then_read_observes_mutation_in_order() {
        let dispatcher = spawn_dispatcher();

        dispatcher
            .submit_write(|state, _now| {
                state.hash_get_or_add("h").fields.insert("a".to_string(), "1".to_string());
                ((), Vec::new())
            })
            .await
            .unwrap();

        let value = dispatcher
            .submit_read(|state, _now| state.hash_get("h").and_then(|h| h.fields.get("a").cloned()))
            .await
            .unwrap();

        assert_eq!(value, Some("1".to_string()));
    }

    #[tokio::test]
    async fn command_errors_do_not_kill_the_worker() {
        let dispatcher = spawn_dispatcher();

        let err: Result<(), StorageError> = dispatcher
            .submit_write(|_state, _now| {
                (Err(StorageError::InvalidArgument { message: "bad".to_string() }), Vec::new())
            })
            .await
            .unwrap();
        assert!(err.is_err());

        // The worker is still alive and serves subsequent commands.
        dispatcher
            .submit_write(|state, _now| {
                state.hash_get_or_add("h2");
                ((), Vec::new())
            })
            .await
            .unwrap();
        let exists = dispatcher
            .submit_read(|state, _now| state.hash_get("h2").is_some())
            .await
            .unwrap();
        assert!(exists);
    }
}
