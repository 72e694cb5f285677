//! Server registration entries, used for worker/heartbeat monitoring.

use crate::clock::MonoTime;

/// Static context a server reports about itself at startup.
#[derive(Debug, Clone)]
pub struct ServerContext {
    /// Number of worker slots this server runs.
    pub worker_count: usize,
    /// Queue names this server pulls jobs from, in priority order.
    pub queues: Vec<String>,
}

/// A registered server and its last-known heartbeat.
#[derive(Debug, Clone)]
pub struct ServerEntry {
    /// Unique server identifier, chosen by the caller.
    pub server_id: String,
    /// Static context reported at registration time.
    pub context: ServerContext,
    /// When this server first registered.
    pub started_at: MonoTime,
    /// Most recent heartbeat time.
    pub heartbeat_at: MonoTime,
}

impl ServerEntry {
    /// Creates a freshly-registered server entry with heartbeat set to now.
    #[must_use]
    pub fn new(server_id: String, context: ServerContext, now: MonoTime) -> Self {
        Self {
            server_id,
            context,
            started_at: now,
            heartbeat_at: now,
        }
    }

    /// Records a heartbeat at the given time.
    pub fn touch(&mut self, now: MonoTime) {
        self.heartbeat_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn t(offset_ms: u64) -> MonoTime {
        MonoTime::from_instant(Instant::now() + std::time::Duration::from_millis(offset_ms))
    }

    #[test]
    fn new_sets_started_and_heartbeat_equal() {
        let entry = ServerEntry::new(
            "server-1".to_string(),
            ServerContext {
                worker_count: 4,
                queues: vec!["default".to_string()],
            },
            t(0),
        );
        assert_eq!(entry.started_at, entry.heartbeat_at);
    }

    #[test]
    fn touch_updates_heartbeat_only() {
        let mut entry = ServerEntry::new(
            "server-1".to_string(),
            ServerContext {
                worker_count: 1,
                queues: vec![],
            },
            t(0),
        );
        entry.touch(t(100));
        assert_eq!(entry.heartbeat_at, t(100));
        assert_eq!(entry.started_at, t(0));
    }
}
