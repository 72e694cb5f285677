//! Engine-wide configuration.

use std::time::Duration;

use jobstore_core::StringComparer;

/// Configuration for a [`crate::engine::Engine`] instance.
///
/// Constructed directly by embedding applications; there is no env-var or
/// file-based loader since the core has no standalone binary.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Caps any user-requested TTL. `None` disables capping. Counters are
    /// exempt. `Some(Duration::ZERO)` forces immediate deletion semantics.
    pub max_expiration_time: Option<Duration>,
    /// String comparison applied to keys, hash fields, sorted-set values,
    /// and queue names -- never to the state-name index.
    pub string_comparer: StringComparer,
    /// Bound on retained state records per job.
    pub max_state_history_length: usize,
    /// Ceiling applied by the dispatcher when awaiting mailbox capacity.
    pub command_timeout: Duration,
    /// Interval between eviction sweeps.
    pub eviction_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_expiration_time: Some(Duration::from_secs(3 * 3600)),
            string_comparer: StringComparer::default(),
            max_state_history_length: 100,
            command_timeout: Duration::from_secs(30),
            eviction_interval: Duration::from_secs(1),
        }
    }
}
