//! Counter write sub-commands.

use std::time::Duration;

use jobstore_core::MonoTime;

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// Adds `by` to the counter at `key` (negative to decrement), creating it
/// zeroed if absent, with an optional TTL applied in the same step.
pub struct IncrementCounter {
    /// Target counter key.
    pub key: String,
    /// Signed delta to apply.
    pub by: i64,
    /// Optional TTL to apply after the increment.
    pub expire_in: Option<Duration>,
}

impl SubCommand for IncrementCounter {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        let entry = state.counter_get_or_add(&self.key);
        entry.value += self.by;
        if entry.value == 0 {
            state.counter_delete(&self.key);
        } else if self.expire_in.is_some() {
            state.counter_expire(&self.key, now, self.expire_in);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn t(offset_ms: u64) -> MonoTime {
        MonoTime::from_instant(Instant::now() + Duration::from_millis(offset_ms))
    }

    #[test]
    fn increment_then_decrement_returns_to_prior_value() {
        let mut state = MemoryState::new(crate::config::EngineConfig::default());
        IncrementCounter { key: "c".to_string(), by: 5, expire_in: None }
            .execute(&mut state, t(0))
            .unwrap();
        IncrementCounter { key: "c".to_string(), by: -5, expire_in: None }
            .execute(&mut state, t(0))
            .unwrap();
        assert!(state.counter_get("c").is_none());
    }
}
