//! Jobstore engine — the single-writer dispatcher, queue and lock engines,
//! command catalog, and façades built on top of `jobstore-core`'s entity
//! model.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod facade;
pub mod lock_engine;
pub mod queue_engine;
pub mod state;

pub use config::EngineConfig;
pub use engine::Engine;
pub use errors::StorageError;
pub use facade::{FetchedJob, JobData, MonitoringFacade, StateData, StorageConnection, TransactionFacade};
pub use lock_engine::{LockEngine, LockHandle};
pub use queue_engine::QueueEngine;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn engine_starts_and_opens_a_connection() {
        let engine = Engine::start(EngineConfig::default());
        let conn = engine.connection();
        let result = conn.get_next_job_from_queues(&["default".to_string()], Duration::from_millis(20)).await;
        assert!(result.is_err());
    }
}
