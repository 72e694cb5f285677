//! Auxiliary collection entries: hashes, lists, sorted sets, counters.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::clock::MonoTime;

/// A string-keyed hash with optional expiration.
#[derive(Debug, Clone)]
pub struct HashEntry {
    /// The hash's key.
    pub key: String,
    /// Absolute expiration time, if any.
    pub expire_at: Option<MonoTime>,
    /// Field -> value mapping, compared with the configured comparer.
    pub fields: BTreeMap<String, String>,
}

impl HashEntry {
    /// Creates an empty hash entry.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self {
            key,
            expire_at: None,
            fields: BTreeMap::new(),
        }
    }
}

/// An ordered list of strings with head-prepend insertion semantics.
#[derive(Debug, Clone)]
pub struct ListEntry {
    /// The list's key.
    pub key: String,
    /// Absolute expiration time, if any.
    pub expire_at: Option<MonoTime>,
    /// Values, most-recently-prepended first.
    pub values: VecDeque<String>,
}

impl ListEntry {
    /// Creates an empty list entry.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self {
            key,
            expire_at: None,
            values: VecDeque::new(),
        }
    }
}

/// A sorted set with dual value->score and score-ordered indexing.
///
/// The `by_value` map gives O(1) membership and score lookups; `by_score`
/// gives ordered range queries. Every mutation that changes a member's score
/// must remove the stale `by_score` entry before inserting the new one, or
/// the two indexes will diverge.
#[derive(Debug, Clone)]
pub struct SortedSetEntry {
    /// The set's key.
    pub key: String,
    /// Absolute expiration time, if any.
    pub expire_at: Option<MonoTime>,
    by_value: HashMap<String, f64>,
    by_score: std::collections::BTreeSet<(ordered_float::OrderedFloat<f64>, String)>,
}

impl SortedSetEntry {
    /// Creates an empty sorted set with the given key.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self {
            key,
            expire_at: None,
            by_value: HashMap::new(),
            by_score: std::collections::BTreeSet::new(),
        }
    }

    /// Inserts or updates `value` with `score`. Removes the stale
    /// `by_score` tree node first if the value already existed.
    pub fn insert(&mut self, value: String, score: f64) {
        if let Some(&old_score) = self.by_value.get(&value) {
            self.by_score
                .remove(&(ordered_float::OrderedFloat(old_score), value.clone()));
        }
        self.by_score
            .insert((ordered_float::OrderedFloat(score), value.clone()));
        self.by_value.insert(value, score);
    }

    /// Removes `value` from the set. Returns its score if it was present.
    pub fn remove(&mut self, value: &str) -> Option<f64> {
        let score = self.by_value.remove(value)?;
        self.by_score
            .remove(&(ordered_float::OrderedFloat(score), value.to_string()));
        Some(score)
    }

    /// Looks up the current score of a member.
    #[must_use]
    pub fn score_of(&self, value: &str) -> Option<f64> {
        self.by_value.get(value).copied()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_value.len()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }

    /// Returns members in score-ascending order within `[start, stop]`
    /// inclusive zero-based rank range. `stop == usize::MAX` means "to the end".
    #[must_use]
    pub fn range_by_rank(&self, start: usize, stop: usize) -> Vec<(String, f64)> {
        self.by_score
            .iter()
            .enumerate()
            .filter(|(i, _)| *i >= start && *i <= stop)
            .map(|(_, (score, value))| (value.clone(), score.0))
            .collect()
    }

    /// Returns all members in score-ascending order.
    #[must_use]
    pub fn all_ascending(&self) -> Vec<(String, f64)> {
        self.by_score.iter().map(|(s, v)| (v.clone(), s.0)).collect()
    }

    /// Asserts the two indexes are in sync. Used by property tests and
    /// debug-time consistency checks; panics on divergence.
    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.by_value.len(), self.by_score.len());
        for (value, score) in &self.by_value {
            assert!(self
                .by_score
                .contains(&(ordered_float::OrderedFloat(*score), value.clone())));
        }
    }
}

/// A monotonically-mutable signed counter with optional expiration.
///
/// Counters are exempt from the `MaxExpirationTime` cap: timeline statistics
/// (hourly/daily buckets) require multi-day retention that a short default
/// TTL would otherwise truncate.
#[derive(Debug, Clone)]
pub struct CounterEntry {
    /// The counter's key.
    pub key: String,
    /// Absolute expiration time, if any.
    pub expire_at: Option<MonoTime>,
    /// Current value.
    pub value: i64,
}

impl CounterEntry {
    /// Creates a zeroed counter entry.
    #[must_use]
    pub fn new(key: String) -> Self {
        Self {
            key,
            expire_at: None,
            value: 0,
        }
    }
}
