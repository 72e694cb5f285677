//! Jobstore core -- the entity model, monotonic clock, key provider, and
//! string-comparison rules shared by the dispatcher, command set, and
//! façades in `jobstore-engine`.
//!
//! - **Clock** ([`clock`]): monotonic time source, decoupled from wall clock
//! - **Ids** ([`ids`]): opaque [`ids::JobId`] and its generator
//! - **Comparer** ([`comparer`]): configurable case sensitivity for keys
//! - **Job** ([`job`]): [`job::JobEntry`] and its state history
//! - **Collections** ([`collections`]): hash, list, sorted-set, counter entries
//! - **Server** ([`server`]): registered-server bookkeeping for monitoring

pub mod clock;
pub mod collections;
pub mod comparer;
pub mod ids;
pub mod job;
pub mod server;

pub use clock::{ClockAnchor, ClockSource, MonoTime, SystemMonoClock, VirtualClock};
pub use collections::{CounterEntry, HashEntry, ListEntry, SortedSetEntry};
pub use comparer::{state_name_key, StringComparer};
pub use ids::{JobId, JobIdProvider};
pub use job::{InvocationData, JobEntry, StateRecord};
pub use server::{ServerContext, ServerEntry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexports_accessible() {
        let _ = StringComparer::default();
        let _ = JobIdProvider::default().next();
        let _ = SystemMonoClock.now();
    }
}
