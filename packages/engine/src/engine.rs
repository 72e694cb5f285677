//! Top-level engine: wires configuration, the dispatcher, the queue and
//! lock engines, and the clock together, and hands out façades.

use std::sync::Arc;

use jobstore_core::{ClockAnchor, ClockSource, JobIdProvider, SystemMonoClock};

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::facade::{MonitoringFacade, StorageConnection};
use crate::lock_engine::LockEngine;
use crate::queue_engine::QueueEngine;

/// One running instance of the core: a dispatcher worker task, a shared
/// queue engine, a shared lock engine, and the clock/id-generation state
/// every façade is constructed from.
///
/// Cloning is cheap (everything inside is an `Arc`/clonable handle); every
/// clone talks to the same dispatcher worker and the same queue/lock state.
#[derive(Clone)]
pub struct Engine {
    dispatcher: Dispatcher,
    queues: Arc<QueueEngine>,
    locks: Arc<LockEngine>,
    clock: Arc<dyn ClockSource>,
    anchor: ClockAnchor,
    id_provider: Arc<JobIdProvider>,
}

impl Engine {
    /// Starts a new engine with the real system clock.
    #[must_use]
    pub fn start(config: EngineConfig) -> Self {
        Self::start_with_clock(config, Arc::new(SystemMonoClock))
    }

    /// Starts a new engine with an injected clock source, for deterministic
    /// tests (e.g. [`jobstore_core::VirtualClock`]).
    #[must_use]
    pub fn start_with_clock(config: EngineConfig, clock: Arc<dyn ClockSource>) -> Self {
        let queues = Arc::new(QueueEngine::with_comparer(config.string_comparer));
        let dispatcher = Dispatcher::spawn(config, clock.clone(), queues.clone());
        Self {
            dispatcher,
            queues,
            locks: Arc::new(LockEngine::new()),
            clock,
            anchor: ClockAnchor::capture_now(),
            id_provider: Arc::new(JobIdProvider::default()),
        }
    }

    /// Opens a new connection sharing this engine's dispatcher, queue
    /// engine, lock engine, and id generator.
    #[must_use]
    pub fn connection(&self) -> StorageConnection {
        StorageConnection::new(
            self.dispatcher.clone(),
            self.queues.clone(),
            self.locks.clone(),
            self.clock.clone(),
            self.anchor,
            self.id_provider.clone(),
        )
    }

    /// Opens a monitoring façade sharing this engine's dispatcher and
    /// queue engine.
    #[must_use]
    pub fn monitoring(&self) -> MonitoringFacade {
        MonitoringFacade::new(self.dispatcher.clone(), self.queues.clone(), self.anchor)
    }
}
