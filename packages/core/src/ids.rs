//! Opaque job identifier and its generator.
//!
//! `JobId` is total-ordered so it can serve as the tie-break component of
//! `(created_at, id)` index keys, but the order itself carries no meaning
//! callers should rely on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque, total-ordered job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u128);

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        JobId::try_parse(&s).ok_or_else(|| serde::de::Error::custom("malformed job id"))
    }
}

impl JobId {
    /// Builds a `JobId` directly from its raw form. Used by tests and by
    /// [`JobIdProvider`]; callers should otherwise treat the value as opaque.
    #[must_use]
    pub fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Canonical lowercase-hex string form.
    #[must_use]
    pub fn to_canonical_string(self) -> String {
        format!("{:032x}", self.0)
    }

    /// Parses a canonical string form. Returns `None` on any malformed input
    /// -- never panics -- so callers can treat an unparseable id as "unknown".
    #[must_use]
    pub fn try_parse(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        u128::from_str_radix(s, 16).ok().map(Self)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

/// Generates fresh, unique [`JobId`] values.
///
/// Folds a monotonic per-process counter into the high bits and a
/// once-per-process random seed into the low bits, so ids are unique across
/// restarts without pulling in a UUID dependency for a value whose only
/// contract is "total order plus a canonical string".
pub struct JobIdProvider {
    counter: AtomicU64,
    process_seed: u64,
}

impl JobIdProvider {
    /// Creates a provider seeded from the given 64-bit value.
    ///
    /// Callers typically seed from a coarse entropy source (e.g. the
    /// process start time in nanoseconds); tests can pass a fixed seed for
    /// determinism.
    #[must_use]
    pub fn new(process_seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(0),
            process_seed,
        }
    }

    /// Generates the next `JobId`. Monotonically increasing for a given
    /// provider instance, which makes `(created_at, id)` tie-breaks stable
    /// even when two jobs share a `created_at`.
    pub fn next(&self) -> JobId {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let raw = (u128::from(counter) << 64) | u128::from(self.process_seed);
        JobId::from_raw(raw)
    }
}

impl Default for JobIdProvider {
    fn default() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(seed)
    }
}
