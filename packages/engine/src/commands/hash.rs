//! Hash write sub-commands.

use std::collections::BTreeMap;
use std::time::Duration;

use jobstore_core::MonoTime;

use crate::errors::StorageError;
use crate::state::MemoryState;

use super::SubCommand;

/// Merges `fields` into the hash at `key`, creating it if absent.
pub struct SetHashFields {
    /// Target hash key.
    pub key: String,
    /// Fields to merge in.
    pub fields: BTreeMap<String, String>,
}

impl SubCommand for SetHashFields {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        let comparer = state.comparer();
        let fields = std::mem::take(&mut self.fields);
        let entry = state.hash_get_or_add(&self.key);
        for (name, value) in fields {
            entry.fields.insert(comparer.normalize(&name), value);
        }
        Ok(())
    }
}

/// Deletes the hash at `key` entirely.
pub struct RemoveHash {
    /// Target hash key.
    pub key: String,
}

impl SubCommand for RemoveHash {
    fn execute(&mut self, state: &mut MemoryState, _now: MonoTime) -> Result<(), StorageError> {
        state.hash_delete(&self.key);
        Ok(())
    }
}

/// Sets or clears a hash's TTL.
pub struct ExpireHash {
    /// Target hash key.
    pub key: String,
    /// Requested TTL; `None` clears it.
    pub expire_in: Option<Duration>,
}

impl SubCommand for ExpireHash {
    fn execute(&mut self, state: &mut MemoryState, now: MonoTime) -> Result<(), StorageError> {
        state.hash_expire(&self.key, now, self.expire_in);
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
    fn set_hash_fields_merges_and_overwrites() {
        let mut state = MemoryState::new(crate::config::EngineConfig::default());
        SetHashFields {
            key: "h".to_string(),
            fields: BTreeMap::from([("a".to_string(), "1".to_string())]),
        }
        .execute(&mut state, t(0))
        .unwrap();
        SetHashFields {
            key: "h".to_string(),
            fields: BTreeMap::from([("a".to_string(), "2".to_string()), ("b".to_string(), "3".to_string())]),
        }
        .execute(&mut state, t(0))
        .unwrap();

        let hash = state.hash_get("h").unwrap();
        assert_eq!(hash.fields.get("a"), Some(&"2".to_string()));
        assert_eq!(hash.fields.get("b"), Some(&"3".to_string()));
    }

    #[test]
    fn set_hash_fields_normalizes_field_names_under_case_insensitive_comparer() {
        let mut config = crate::config::EngineConfig::default();
        config.string_comparer = jobstore_core::StringComparer::CaseInsensitive;
        let mut state = MemoryState::new(config);
        SetHashFields {
            key: "h".to_string(),
            fields: BTreeMap::from([("Name".to_string(), "1".to_string())]),
        }
        .execute(&mut state, t(0))
        .unwrap();
        SetHashFields {
            key: "h".to_string(),
            fields: BTreeMap::from([("NAME".to_string(), "2".to_string())]),
        }
        .execute(&mut state, t(0))
        .unwrap();

        let hash = state.hash_get("h").unwrap();
        assert_eq!(hash.fields.len(), 1, "same field name under different casing must not duplicate");
        assert_eq!(hash.fields.get("name"), Some(&"2".to_string()));
    }

    #[test]
    fn remove_hash_deletes_entirely() {
        let mut state = MemoryState::new(crate::config::EngineConfig::default());
        SetHashFields { key: "h".to_string(), fields: BTreeMap::new() }
            .execute(&mut state, t(0))
            .unwrap();
        RemoveHash { key: "h".to_string() }.execute(&mut state, t(0)).unwrap();
        assert!(state.hash_get("h").is_none());
    }
}
