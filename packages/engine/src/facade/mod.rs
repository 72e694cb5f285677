//! The three in-process APIs the surrounding framework embeds against: a
//! connection for reads and one-shot server bookkeeping, a transaction
//! for composite writes, and a monitoring façade for dashboard
//! projections.

pub mod connection;
pub mod monitoring;
pub mod transaction;

pub use connection::{FetchedJob, JobData, StateData, StorageConnection};
pub use monitoring::MonitoringFacade;
pub use transaction::TransactionFacade;
