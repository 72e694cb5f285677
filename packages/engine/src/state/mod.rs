//! In-memory state: entities, secondary indexes, and their mutation
//! primitives. Owned exclusively by the dispatcher's worker task.

pub mod indexes;
pub mod memory_state;

pub use memory_state::{require_job, ExpireOutcome, MemoryState};
