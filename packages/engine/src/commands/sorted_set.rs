//! Sorted-set write sub-commands.

use std::time::Duration;

use jobstore_core::MonoTime;

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// Inserts or updates `value` at `score` in the sorted set at `key`.
pub struct AddToSet {
    /// Target set key.
    pub key: String,
    /// Member value.
    pub value: String,
    /// Member score.
    pub score: f64,
}

impl SubCommand for AddToSet {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        if !self.score.is_finite() {
            return Err(StorageError::InvalidArgument {
                message: format!("sorted-set score must be finite, got {}", self.score),
            });
        }
        let value = state.normalize_set_value(&self.value);
        state.set_get_or_add(&self.key).insert(value, self.score);
        Ok(())
    }
}

/// Removes a single member from the sorted set at `key`. The set itself is
/// left in place (possibly empty) -- use [`RemoveSet`] to delete it.
pub struct RemoveFromSet {
    /// Target set key.
    pub key: String,
    /// Member value to remove.
    pub value: String,
}

impl SubCommand for RemoveFromSet {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        let value = state.normalize_set_value(&self.value);
        if let Some(entry) = state.set_get(&self.key) {
            if entry.score_of(&value).is_some() {
                state.set_get_or_add(&self.key).remove(&value);
            }
        }
        Ok(())
    }
}

/// Deletes the sorted set at `key` entirely.
pub struct RemoveSet {
    /// Target set key.
    pub key: String,
}

impl SubCommand for RemoveSet {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        state.set_delete(&self.key);
        Ok(())
    }
}

/// Sets or clears a sorted set's TTL.
pub struct ExpireSet {
    /// Target set key.
    pub key: String,
    /// Requested TTL; `None` clears it.
    pub expire_in: Option<Duration>,
}

impl SubCommand for ExpireSet {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.set_expire(&self.key, now, self.expire_in);
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
    fn add_to_set_twice_leaves_one_member_with_latest_score() {
        let mut state = MemoryState::new(crate::config::EngineConfig::default());
        AddToSet { key: "s".to_string(), value: "v".to_string(), score: 1.0 }
            .execute(&mut state, t(0))
            .unwrap();
        AddToSet { key: "s".to_string(), value: "v".to_string(), score: 2.0 }
            .execute(&mut state, t(0))
            .unwrap();
        let set = state.set_get("s").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.score_of("v"), Some(2.0));
    }

    #[test]
    fn add_to_set_normalizes_values_under_case_insensitive_comparer() {
        let mut config = crate::config::EngineConfig::default();
        config.string_comparer = jobstore_core::StringComparer::CaseInsensitive;
        let mut state = MemoryState::new(config);
        AddToSet { key: "s".to_string(), value: "Value".to_string(), score: 1.0 }
            .execute(&mut state, t(0))
            .unwrap();
        AddToSet { key: "s".to_string(), value: "VALUE".to_string(), score: 2.0 }
            .execute(&mut state, t(0))
            .unwrap();
        let set = state.set_get("s").unwrap();
        assert_eq!(set.len(), 1, "same value under different casing must not duplicate");
        assert_eq!(set.score_of("value"), Some(2.0));

        RemoveFromSet { key: "s".to_string(), value: "VALUE".to_string() }
            .execute(&mut state, t(0))
            .unwrap();
        assert!(state.set_get("s").unwrap().is_empty());
    }

    #[test]
    fn add_to_set_rejects_nan_score() {
        let mut state = MemoryState::new(crate::config::EngineConfig::default());
        let err = AddToSet { key: "s".to_string(), value: "v".to_string(), score: f64::NAN }
            .execute(&mut state, t(0))
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument { .. }));
        assert!(state.set_get("s").is_none());
    }
}
