//! Secondary indexes maintained by [`super::memory_state::MemoryState`].

use std::collections::{BTreeMap, BTreeSet};

use jobstore_core::{comparer::state_name_key, JobId, MonoTime};

/// Per-state-name ordered index of jobs currently in that state, ordered by
/// `(state.created_at, id)`. State names are always folded case-insensitively
/// here, regardless of the configured [`jobstore_core::StringComparer`] --
/// this index is framework-internal, not user data.
#[derive(Debug, Default)]
pub struct JobStateIndex {
    buckets: BTreeMap<String, BTreeSet<(MonoTime, JobId)>>,
}

impl JobStateIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id` into the bucket for `state_name`.
    pub fn insert(&mut self, state_name: &str, created_at: MonoTime, id: JobId) {
        self.buckets
            .entry(state_name_key(state_name))
            .or_default()
            .insert((created_at, id));
    }

    /// Removes `id` from the bucket for `state_name`. No-op if absent.
    pub fn remove(&mut self, state_name: &str, created_at: MonoTime, id: JobId) {
        let key = state_name_key(state_name);
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.remove(&(created_at, id));
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
    }

    /// Returns the ids currently in `state_name`'s bucket, in index order.
    #[must_use]
    pub fn ids_in_state(&self, state_name: &str) -> Vec<JobId> {
        self.buckets
            .get(&state_name_key(state_name))
            .map(|b| b.iter().map(|(_, id)| *id).collect())
            .unwrap_or_default()
    }

    /// Number of jobs currently tracked in `state_name`'s bucket.
    #[must_use]
    pub fn count_in_state(&self, state_name: &str) -> usize {
        self.buckets
            .get(&state_name_key(state_name))
            .map_or(0, BTreeSet::len)
    }
}

/// Per-kind expiration index: a `BTreeSet<(expire_at, key)>` containing only
/// entries with a non-null `expire_at`.
#[derive(Debug, Default)]
pub struct ExpirationIndex {
    entries: BTreeSet<(MonoTime, String)>,
}

impl ExpirationIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` at `expire_at`.
    pub fn insert(&mut self, expire_at: MonoTime, key: String) {
        self.entries.insert((expire_at, key));
    }

    /// Removes `key` previously inserted at `expire_at`. No-op if absent.
    pub fn remove(&mut self, expire_at: MonoTime, key: &str) {
        self.entries.remove(&(expire_at, key.to_string()));
    }

    /// Number of tracked entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no tracked entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pops and returns the key of the earliest entry if its `expire_at` is
    /// `<= now`, leaving the index otherwise untouched.
    pub fn pop_expired(&mut self, now: MonoTime) -> Option<String> {
        let front = self.entries.iter().next().cloned()?;
        if front.0 <= now {
            self.entries.remove(&front);
            Some(front.1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn t(offset_ms: u64) -> MonoTime {
        MonoTime::from_instant(Instant::now() + Duration::from_millis(offset_ms))
    }

    #[test]
    fn job_state_index_is_case_insensitive() {
        let mut idx = JobStateIndex::new();
        idx.insert("Enqueued", t(0), JobId::from_raw(1));
        assert_eq!(idx.count_in_state("ENQUEUED"), 1);
        assert_eq!(idx.ids_in_state("enqueued"), vec![JobId::from_raw(1)]);
    }

    #[test]
    fn job_state_index_remove_drops_empty_bucket() {
        let mut idx = JobStateIndex::new();
        idx.insert("Enqueued", t(0), JobId::from_raw(1));
        idx.remove("enqueued", t(0), JobId::from_raw(1));
        assert_eq!(idx.count_in_state("Enqueued"), 0);
    }

    #[test]
    fn job_state_index_orders_by_created_at_then_id() {
        let mut idx = JobStateIndex::new();
        idx.insert("s", t(10), JobId::from_raw(2));
        idx.insert("s", t(5), JobId::from_raw(1));
        assert_eq!(
            idx.ids_in_state("s"),
            vec![JobId::from_raw(1), JobId::from_raw(2)]
        );
    }

    #[test]
    fn expiration_index_pop_expired_respects_now() {
        let mut idx = ExpirationIndex::new();
        idx.insert(t(10), "a".to_string());
        idx.insert(t(20), "b".to_string());

        assert_eq!(idx.pop_expired(t(5)), None);
        assert_eq!(idx.pop_expired(t(15)), Some("a".to_string()));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.pop_expired(t(25)), Some("b".to_string()));
        assert!(idx.is_empty());
    }
}
