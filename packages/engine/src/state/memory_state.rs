//! The sole mutable owner of every entity: jobs, auxiliary collections,
//! servers, and their secondary indexes.
//!
//! Lives exclusively inside the dispatcher's worker task; never shared or
//! sent to another task. All mutation goes through its primitives so every
//! index stays consistent with its primary collection.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use jobstore_core::{
    CounterEntry, HashEntry, JobEntry, JobId, ListEntry, MonoTime, ServerContext, ServerEntry,
    SortedSetEntry, StateRecord, StringComparer,
};

use crate::config::EngineConfig;
use crate::errors::StorageError;

use super::indexes::{ExpirationIndex, JobStateIndex};

/// Outcome of the common `entry_expire` algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireOutcome {
    /// The entry should be kept, with `expire_at` updated as requested.
    Keep,
    /// The entry's TTL resolved to "now or in the past"; delete it.
    DeleteNow,
}

/// All in-memory state for one engine instance.
pub struct MemoryState {
    config: EngineConfig,

    jobs: HashMap<JobId, JobEntry>,
    hashes: HashMap<String, HashEntry>,
    lists: HashMap<String, ListEntry>,
    sorted_sets: HashMap<String, SortedSetEntry>,
    counters: HashMap<String, CounterEntry>,
    servers: HashMap<String, ServerEntry>,

    job_state_index: JobStateIndex,
    jobs_expiration: ExpirationIndex,
    hashes_expiration: ExpirationIndex,
    lists_expiration: ExpirationIndex,
    sets_expiration: ExpirationIndex,
    counters_expiration: ExpirationIndex,
}

impl MemoryState {
    /// Creates an empty state under the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            jobs: HashMap::new(),
            hashes: HashMap::new(),
            lists: HashMap::new(),
            sorted_sets: HashMap::new(),
            counters: HashMap::new(),
            servers: HashMap::new(),
            job_state_index: JobStateIndex::new(),
            jobs_expiration: ExpirationIndex::new(),
            hashes_expiration: ExpirationIndex::new(),
            lists_expiration: ExpirationIndex::new(),
            sets_expiration: ExpirationIndex::new(),
            counters_expiration: ExpirationIndex::new(),
        }
    }

    /// The configured string comparer.
    #[must_use]
    pub fn comparer(&self) -> StringComparer {
        self.config.string_comparer
    }

    /// Normalizes a key, hash field, or sorted-set value under the
    /// configured comparer before it touches a map or index. Never applied
    /// to job ids or the job-state index.
    fn normalize(&self, s: &str) -> String {
        self.config.string_comparer.normalize(s)
    }

    // ---------------------------------------------------------------
    // Common expiration algorithm
    // ---------------------------------------------------------------

    /// The common `entry_expire` algorithm shared by every expirable kind.
    ///
    /// `current_expire_at` is the entry's present `expire_at`, which this
    /// call removes from `index` if present. `expire_in` is the requested
    /// new TTL. Returns the outcome and, on [`ExpireOutcome::Keep`], the new
    /// `expire_at` the caller should store.
    fn entry_expire(
        index: &mut ExpirationIndex,
        key: &str,
        current_expire_at: Option<MonoTime>,
        now: MonoTime,
        expire_in: Option<Duration>,
        max_expiration_time: Option<Duration>,
        ignore_max: bool,
    ) -> (ExpireOutcome, Option<MonoTime>) {
        if let Some(old) = current_expire_at {
            index.remove(old, key);
        }

        let Some(mut expire_in) = expire_in else {
            return (ExpireOutcome::Keep, None);
        };

        if !ignore_max {
            if let Some(max) = max_expiration_time {
                if expire_in > max {
                    expire_in = max;
                }
            }
        }

        if expire_in <= Duration::ZERO {
            return (ExpireOutcome::DeleteNow, None);
        }

        let new_expire_at = now + expire_in;
        index.insert(new_expire_at, key.to_string());
        (ExpireOutcome::Keep, Some(new_expire_at))
    }

    // ---------------------------------------------------------------
    // Jobs
    // ---------------------------------------------------------------

    /// Inserts a freshly-created job. Returns `false` if the id was already
    /// present (callers should treat this as impossible given a correctly
    /// behaving [`jobstore_core::JobIdProvider`]).
    pub fn job_create(&mut self, entry: JobEntry) -> bool {
        if self.jobs.contains_key(&entry.id) {
            return false;
        }
        self.jobs.insert(entry.id, entry);
        true
    }

    /// Borrows a job by id.
    #[must_use]
    pub fn job_get(&self, id: JobId) -> Option<&JobEntry> {
        self.jobs.get(&id)
    }

    /// Mutably borrows a job by id.
    pub fn job_get_mut(&mut self, id: JobId) -> Option<&mut JobEntry> {
        self.jobs.get_mut(&id)
    }

    /// Pushes a new state record, updating the job-state index.
    pub fn job_set_state(&mut self, id: JobId, record: StateRecord) -> bool {
        let max_len = self.config.max_state_history_length;
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        if let Some(old) = &job.current_state {
            self.job_state_index
                .remove(&old.name, old.created_at, id);
        }
        self.job_state_index
            .insert(&record.name, record.created_at, id);
        job.push_state(record, max_len);
        true
    }

    /// Appends a state record to history without disturbing `current_state`
    /// or the job-state index. Distinct from [`Self::job_set_state`], which
    /// transitions the job.
    pub fn job_add_state(&mut self, id: JobId, record: StateRecord) -> bool {
        let max_len = self.config.max_state_history_length;
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        job.state_history.push_front(record);
        while job.state_history.len() > max_len {
            job.state_history.pop_back();
        }
        true
    }

    /// Sets or clears a job's expiration. No-op (returns `false`) if the job
    /// is unknown.
    pub fn job_expire(&mut self, id: JobId, now: MonoTime, expire_in: Option<Duration>) -> bool {
        let max = self.config.max_expiration_time;
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        let (outcome, new_expire_at) = Self::entry_expire(
            &mut self.jobs_expiration,
            &id.to_canonical_string(),
            job.expire_at,
            now,
            expire_in,
            max,
            false,
        );
        match outcome {
            ExpireOutcome::DeleteNow => {
                self.job_delete(id);
            }
            ExpireOutcome::Keep => {
                job.expire_at = new_expire_at;
            }
        }
        true
    }

    /// Deletes a job and removes it from every index it may belong to.
    pub fn job_delete(&mut self, id: JobId) -> Option<JobEntry> {
        let job = self.jobs.remove(&id)?;
        if let Some(state) = &job.current_state {
            self.job_state_index.remove(&state.name, state.created_at, id);
        }
        if let Some(expire_at) = job.expire_at {
            self.jobs_expiration.remove(expire_at, &id.to_canonical_string());
        }
        Some(job)
    }

    /// Sets a single parameter on a job. No-op if unknown.
    pub fn job_add_parameter(&mut self, id: JobId, name: String, value: String) -> bool {
        let name = self.normalize(&name);
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        job.parameters.insert(name, value);
        true
    }

    /// Ids currently in the named state, via the job-state index.
    #[must_use]
    pub fn ids_in_state(&self, state_name: &str) -> Vec<JobId> {
        self.job_state_index.ids_in_state(state_name)
    }

    /// Number of jobs currently in the named state.
    #[must_use]
    pub fn count_in_state(&self, state_name: &str) -> usize {
        self.job_state_index.count_in_state(state_name)
    }

    // ---------------------------------------------------------------
    // Hashes
    // ---------------------------------------------------------------

    /// Returns the hash at `key`, creating an empty one if absent.
    pub fn hash_get_or_add(&mut self, key: &str) -> &mut HashEntry {
        let key = self.normalize(key);
        self.hashes
            .entry(key.clone())
            .or_insert_with(|| HashEntry::new(key))
    }

    /// Borrows the hash at `key`, if present.
    #[must_use]
    pub fn hash_get(&self, key: &str) -> Option<&HashEntry> {
        self.hashes.get(&self.normalize(key))
    }

    /// Sets or clears a hash's expiration.
    pub fn hash_expire(&mut self, key: &str, now: MonoTime, expire_in: Option<Duration>) -> bool {
        let key = self.normalize(key);
        let max = self.config.max_expiration_time;
        let Some(entry) = self.hashes.get_mut(&key) else {
            return false;
        };
        let (outcome, new_expire_at) =
            Self::entry_expire(&mut self.hashes_expiration, &key, entry.expire_at, now, expire_in, max, false);
        match outcome {
            ExpireOutcome::DeleteNow => {
                self.hash_delete(&key);
            }
            ExpireOutcome::Keep => entry.expire_at = new_expire_at,
        }
        true
    }

    /// Deletes a hash and removes it from the expiration index.
    pub fn hash_delete(&mut self, key: &str) -> Option<HashEntry> {
        let key = self.normalize(key);
        let entry = self.hashes.remove(&key)?;
        if let Some(expire_at) = entry.expire_at {
            self.hashes_expiration.remove(expire_at, &key);
        }
        Some(entry)
    }

    // ---------------------------------------------------------------
    // Lists
    // ---------------------------------------------------------------

    /// Returns the list at `key`, creating an empty one if absent.
    pub fn list_get_or_add(&mut self, key: &str) -> &mut ListEntry {
        let key = self.normalize(key);
        self.lists
            .entry(key.clone())
            .or_insert_with(|| ListEntry::new(key))
    }

    /// Borrows the list at `key`, if present.
    #[must_use]
    pub fn list_get(&self, key: &str) -> Option<&ListEntry> {
        self.lists.get(&self.normalize(key))
    }

    /// Sets or clears a list's expiration.
    pub fn list_expire(&mut self, key: &str, now: MonoTime, expire_in: Option<Duration>) -> bool {
        let key = self.normalize(key);
        let max = self.config.max_expiration_time;
        let Some(entry) = self.lists.get_mut(&key) else {
            return false;
        };
        let (outcome, new_expire_at) =
            Self::entry_expire(&mut self.lists_expiration, &key, entry.expire_at, now, expire_in, max, false);
        match outcome {
            ExpireOutcome::DeleteNow => {
                self.list_delete(&key);
            }
            ExpireOutcome::Keep => entry.expire_at = new_expire_at,
        }
        true
    }

    /// Deletes a list and removes it from the expiration index.
    pub fn list_delete(&mut self, key: &str) -> Option<ListEntry> {
        let key = self.normalize(key);
        let entry = self.lists.remove(&key)?;
        if let Some(expire_at) = entry.expire_at {
            self.lists_expiration.remove(expire_at, &key);
        }
        Some(entry)
    }

    // ---------------------------------------------------------------
    // Sorted sets
    // ---------------------------------------------------------------

    /// Returns the sorted set at `key`, creating an empty one if absent.
    pub fn set_get_or_add(&mut self, key: &str) -> &mut SortedSetEntry {
        let key = self.normalize(key);
        self.sorted_sets
            .entry(key.clone())
            .or_insert_with(|| SortedSetEntry::new(key))
    }

    /// Borrows the sorted set at `key`, if present.
    #[must_use]
    pub fn set_get(&self, key: &str) -> Option<&SortedSetEntry> {
        self.sorted_sets.get(&self.normalize(key))
    }

    /// Sets or clears a sorted set's expiration.
    pub fn set_expire(&mut self, key: &str, now: MonoTime, expire_in: Option<Duration>) -> bool {
        let key = self.normalize(key);
        let max = self.config.max_expiration_time;
        let Some(entry) = self.sorted_sets.get_mut(&key) else {
            return false;
        };
        let (outcome, new_expire_at) =
            Self::entry_expire(&mut self.sets_expiration, &key, entry.expire_at, now, expire_in, max, false);
        match outcome {
            ExpireOutcome::DeleteNow => {
                self.set_delete(&key);
            }
            ExpireOutcome::Keep => entry.expire_at = new_expire_at,
        }
        true
    }

    /// Deletes a sorted set and removes it from the expiration index.
    pub fn set_delete(&mut self, key: &str) -> Option<SortedSetEntry> {
        let key = self.normalize(key);
        let entry = self.sorted_sets.remove(&key)?;
        if let Some(expire_at) = entry.expire_at {
            self.sets_expiration.remove(expire_at, &key);
        }
        Some(entry)
    }

    /// Normalizes a sorted-set member value under the configured comparer.
    /// Call before every `SortedSetEntry` insert/remove/lookup.
    #[must_use]
    pub fn normalize_set_value(&self, value: &str) -> String {
        self.normalize(value)
    }

    // ---------------------------------------------------------------
    // Counters
    // ---------------------------------------------------------------

    /// Returns the counter at `key`, creating a zeroed one if absent.
    pub fn counter_get_or_add(&mut self, key: &str) -> &mut CounterEntry {
        let key = self.normalize(key);
        self.counters
            .entry(key.clone())
            .or_insert_with(|| CounterEntry::new(key))
    }

    /// Borrows the counter at `key`, if present.
    #[must_use]
    pub fn counter_get(&self, key: &str) -> Option<&CounterEntry> {
        self.counters.get(&self.normalize(key))
    }

    /// Sets or clears a counter's expiration. Counters bypass the
    /// `max_expiration_time` cap -- timeline statistics require multi-day
    /// retention a short default TTL would otherwise truncate.
    pub fn counter_expire(&mut self, key: &str, now: MonoTime, expire_in: Option<Duration>) -> bool {
        let key = self.normalize(key);
        let Some(entry) = self.counters.get_mut(&key) else {
            return false;
        };
        let (outcome, new_expire_at) = Self::entry_expire(
            &mut self.counters_expiration,
            &key,
            entry.expire_at,
            now,
            expire_in,
            None,
            true,
        );
        match outcome {
            ExpireOutcome::DeleteNow => {
                self.counter_delete(&key);
            }
            ExpireOutcome::Keep => entry.expire_at = new_expire_at,
        }
        true
    }

    /// Deletes a counter and removes it from the expiration index.
    pub fn counter_delete(&mut self, key: &str) -> Option<CounterEntry> {
        let entry = self.counters.remove(key)?;
        if let Some(expire_at) = entry.expire_at {
            self.counters_expiration.remove(expire_at, key);
        }
        Some(entry)
    }

    // ---------------------------------------------------------------
    // Servers
    // ---------------------------------------------------------------

    /// Registers or re-registers a server.
    pub fn server_add(&mut self, server_id: String, context: ServerContext, now: MonoTime) {
        self.servers
            .insert(server_id.clone(), ServerEntry::new(server_id, context, now));
    }

    /// Removes a server registration.
    pub fn server_remove(&mut self, server_id: &str) -> Option<ServerEntry> {
        self.servers.remove(server_id)
    }

    /// Records a heartbeat for a registered server. No-op if unknown.
    pub fn server_heartbeat(&mut self, server_id: &str, now: MonoTime) -> bool {
        let Some(server) = self.servers.get_mut(server_id) else {
            return false;
        };
        server.touch(now);
        true
    }

    /// Borrows a server registration, if present.
    #[must_use]
    pub fn server_get(&self, server_id: &str) -> Option<&ServerEntry> {
        self.servers.get(server_id)
    }

    /// All registered servers.
    #[must_use]
    pub fn servers_all(&self) -> Vec<&ServerEntry> {
        self.servers.values().collect()
    }

    // ---------------------------------------------------------------
    // Eviction
    // ---------------------------------------------------------------

    /// Evicts every expirable entry whose `expire_at <= now`, across every
    /// kind, keeping all indexes consistent. Returns the number evicted.
    pub fn evict_expired_entries(&mut self, now: MonoTime) -> usize {
        let mut evicted = 0;

        while let Some(key) = self.jobs_expiration.pop_expired(now) {
            if let Some(id) = JobId::try_parse(&key) {
                // Expiration index removal already happened in pop_expired;
                // job_delete would try to remove it again (a no-op on a
                // BTreeSet) so this stays correct either way.
                if let Some(job) = self.jobs.remove(&id) {
                    if let Some(state) = &job.current_state {
                        self.job_state_index.remove(&state.name, state.created_at, id);
                    }
                    evicted += 1;
                }
            }
        }
        while let Some(key) = self.hashes_expiration.pop_expired(now) {
            if self.hashes.remove(&key).is_some() {
                evicted += 1;
            }
        }
        while let Some(key) = self.lists_expiration.pop_expired(now) {
            if self.lists.remove(&key).is_some() {
                evicted += 1;
            }
        }
        while let Some(key) = self.sets_expiration.pop_expired(now) {
            if self.sorted_sets.remove(&key).is_some() {
                evicted += 1;
            }
        }
        while let Some(key) = self.counters_expiration.pop_expired(now) {
            if self.counters.remove(&key).is_some() {
                evicted += 1;
            }
        }

        evicted
    }

    /// Size of each kind's primary map and matching expiration index, for
    /// consistency checks: the two counts must always match.
    #[must_use]
    #[cfg(test)]
    pub(crate) fn expirable_counts(&self) -> BTreeMap<&'static str, (usize, usize)> {
        let mut counts = BTreeMap::new();
        counts.insert(
            "hashes",
            (
                self.hashes.values().filter(|h| h.expire_at.is_some()).count(),
                self.hashes_expiration.len(),
            ),
        );
        counts.insert(
            "lists",
            (
                self.lists.values().filter(|l| l.expire_at.is_some()).count(),
                self.lists_expiration.len(),
            ),
        );
        counts.insert(
            "sets",
            (
                self.sorted_sets.values().filter(|s| s.expire_at.is_some()).count(),
                self.sets_expiration.len(),
            ),
        );
        counts.insert(
            "counters",
            (
                self.counters.values().filter(|c| c.expire_at.is_some()).count(),
                self.counters_expiration.len(),
            ),
        );
        counts.insert(
            "jobs",
            (
                self.jobs.values().filter(|j| j.expire_at.is_some()).count(),
                self.jobs_expiration.len(),
            ),
        );
        counts
    }
}

/// Translates a missing job into a `StorageError`, for callers that need
/// an error rather than the façade-level convention of `Ok(None)`.
pub fn require_job<'a>(state: &'a MemoryState, id: JobId) -> Result<&'a JobEntry, StorageError> {
    state.job_get(id).ok_or(StorageError::UnknownJob { id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobstore_core::InvocationData;
    use std::time::Instant;

    fn t(offset_ms: u64) -> MonoTime {
        MonoTime::from_instant(Instant::now() + Duration::from_millis(offset_ms))
    }

    fn job(id: u128, created_at: MonoTime) -> JobEntry {
        JobEntry::new(
            JobId::from_raw(id),
            InvocationData {
                type_tag: "Test".to_string(),
                payload: vec![],
            },
            created_at,
        )
    }

    #[test]
    fn job_set_state_updates_index_and_moves_buckets() {
        let mut state = MemoryState::new(EngineConfig::default());
        let id = JobId::from_raw(1);
        state.job_create(job(1, t(0)));

        state.job_set_state(
            id,
            StateRecord {
                name: "Enqueued".to_string(),
                reason: None,
                created_at: t(1),
                data: BTreeMap::new(),
            },
        );
        assert_eq!(state.count_in_state("Enqueued"), 1);

        state.job_set_state(
            id,
            StateRecord {
                name: "Processing".to_string(),
                reason: None,
                created_at: t(2),
                data: BTreeMap::new(),
            },
        );
        assert_eq!(state.count_in_state("Enqueued"), 0);
        assert_eq!(state.count_in_state("Processing"), 1);
    }

    #[test]
    fn job_expire_deletes_now_on_zero_duration() {
        let mut state = MemoryState::new(EngineConfig::default());
        let id = JobId::from_raw(1);
        state.job_create(job(1, t(0)));
        state.job_expire(id, t(0), Some(Duration::ZERO));
        assert!(state.job_get(id).is_none());
    }

    #[test]
    fn job_expire_caps_to_max_expiration_time() {
        let mut config = EngineConfig::default();
        config.max_expiration_time = Some(Duration::from_secs(3 * 3600));
        let mut state = MemoryState::new(config);
        let id = JobId::from_raw(1);
        state.job_create(job(1, t(0)));
        let now = t(0);
        state.job_expire(id, now, Some(Duration::from_secs(7 * 24 * 3600)));
        let expire_at = state.job_get(id).unwrap().expire_at.unwrap();
        assert_eq!(expire_at, now + Duration::from_secs(3 * 3600));
    }

    #[test]
    fn counter_expire_ignores_max_expiration_cap() {
        let mut config = EngineConfig::default();
        config.max_expiration_time = Some(Duration::from_secs(1));
        let mut state = MemoryState::new(config);
        state.counter_get_or_add("stats:succeeded");
        let now = t(0);
        state.counter_expire("stats:succeeded", now, Some(Duration::from_secs(7 * 24 * 3600)));
        let expire_at = state.counter_get("stats:succeeded").unwrap().expire_at.unwrap();
        assert_eq!(expire_at, now + Duration::from_secs(7 * 24 * 3600));
    }

    #[test]
    fn evict_expired_entries_keeps_indexes_consistent() {
        let mut state = MemoryState::new(EngineConfig::default());
        for (i, ms) in [10_u64, 20, 30, 40, 50].into_iter().enumerate() {
            let key = format!("h{i}");
            state.hash_get_or_add(&key);
            state.hash_expire(&key, t(0), Some(Duration::from_millis(ms)));
        }

        let evicted = state.evict_expired_entries(t(35));
        assert_eq!(evicted, 3);

        let counts = state.expirable_counts();
        let (present, indexed) = counts["hashes"];
        assert_eq!(present, indexed);
        assert_eq!(present, 2);
    }

    #[test]
    fn expire_then_persist_clears_index() {
        let mut state = MemoryState::new(EngineConfig::default());
        let id = JobId::from_raw(1);
        state.job_create(job(1, t(0)));
        state.job_expire(id, t(0), Some(Duration::from_secs(10)));
        assert!(state.job_get(id).unwrap().expire_at.is_some());

        state.job_expire(id, t(0), None);
        assert!(state.job_get(id).unwrap().expire_at.is_none());
        let counts = state.expirable_counts();
        assert_eq!(counts["jobs"], (0, 0));
    }

    proptest::proptest! {
        /// A hash has `expire_at.is_some()` iff it is a member of the
        /// expiration index, under any interleaving of sets, clears, and
        /// eviction sweeps.
        #[test]
        fn hash_expiration_index_stays_consistent(
            ops in proptest::collection::vec(
                (0_u8..4, 0_u64..60, 0_u64..40),
                0..60,
            )
        ) {
            let mut state = MemoryState::new(EngineConfig::default());
            let base = t(0);

            for (op, key_id, ttl_ms) in ops {
                let key = format!("h{}", key_id % 8);
                match op {
                    0 => {
                        state.hash_get_or_add(&key);
                        state.hash_expire(&key, base, Some(Duration::from_millis(ttl_ms)));
                    }
                    1 => {
                        state.hash_get_or_add(&key);
                        state.hash_expire(&key, base, None);
                    }
                    2 => {
                        state.hash_delete(&key);
                    }
                    _ => {
                        let now = base + Duration::from_millis(ttl_ms);
                        state.evict_expired_entries(now);
                    }
                }

                let (present, indexed) = state.expirable_counts()["hashes"];
                proptest::prop_assert_eq!(present, indexed);
            }
        }
    }
}
