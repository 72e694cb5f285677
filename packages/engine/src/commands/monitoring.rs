//! Read-only monitoring projections: entities rendered into DTO shapes for
//! dashboards. These never mutate state and carry no post-commit signaling,
//! so they are plain functions over `&MemoryState` rather than
//! [`super::SubCommand`] objects.

use chrono::Timelike;
use jobstore_core::{JobId, MonoTime};

use crate::state::MemoryState;

/// A queue with a bounded preview of its enqueued jobs.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueSummary {
    /// Queue name.
    pub name: String,
    /// Total number of enqueued jobs.
    pub length: usize,
    /// Up to five job ids at the head of the queue.
    pub preview: Vec<JobId>,
}

/// A registered server's monitoring projection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerSummary {
    /// Server id.
    pub server_id: String,
    /// Number of worker slots.
    pub worker_count: usize,
    /// Queue names this server serves.
    pub queues: Vec<String>,
    /// Unix-epoch millis the server first registered.
    pub started_at_millis: i64,
    /// Unix-epoch millis of the most recent heartbeat.
    pub heartbeat_at_millis: i64,
}

/// Full projection of one job for a details view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobDetails {
    /// Job id.
    pub id: JobId,
    /// Current state name, if any.
    pub current_state: Option<String>,
    /// Job parameters.
    pub parameters: std::collections::BTreeMap<String, String>,
    /// Number of retained history entries.
    pub history_length: usize,
}

/// Aggregate counts across job states, for a dashboard summary tile.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatisticsSummary {
    /// Count of jobs in each named state.
    pub counts_by_state: std::collections::BTreeMap<String, usize>,
    /// Fixed running total of succeeded jobs (`stats:succeeded` counter).
    pub succeeded_total: i64,
    /// Fixed running total of deleted jobs (`stats:deleted` counter).
    pub deleted_total: i64,
    /// Number of recurring job definitions (`recurring-jobs` sorted set).
    pub recurring_count: usize,
    /// Number of scheduled retries (`retries` sorted set).
    pub retries_count: usize,
}

/// One page of job ids in a given state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobPage {
    /// Ids in this page, in index order.
    pub ids: Vec<JobId>,
    /// Total number of jobs in the queried state.
    pub total: usize,
}

/// One bucket of a timeline: the counter key it was read from, the bucket's
/// start time, and the value stored there.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelinePoint {
    /// The counter key this bucket was read from (e.g. `stats:succeeded:2026-07-30`).
    pub key: String,
    /// Bucket start time, as Unix-epoch millis.
    pub timestamp_millis: i64,
    /// The counter's value, or 0 if the framework never wrote this bucket.
    pub count: i64,
}

/// Builds a [`QueueSummary`] for `queue_name`, given its live content from
/// the queue engine (monitoring reads the queue engine directly since its
/// FIFO does not live in `MemoryState`).
#[must_use]
pub fn queue_summary(name: &str, contents: &[JobId]) -> QueueSummary {
    QueueSummary {
        name: name.to_string(),
        length: contents.len(),
        preview: contents.iter().take(5).copied().collect(),
    }
}

/// Projects every registered server into a [`ServerSummary`].
#[must_use]
pub fn server_summaries(state: &MemoryState, anchor: &jobstore_core::ClockAnchor) -> Vec<ServerSummary> {
    state
        .servers_all()
        .into_iter()
        .map(|server| ServerSummary {
            server_id: server.server_id.clone(),
            worker_count: server.context.worker_count,
            queues: server.context.queues.clone(),
            started_at_millis: server.started_at.to_unix_millis(anchor),
            heartbeat_at_millis: server.heartbeat_at.to_unix_millis(anchor),
        })
        .collect()
}

/// Projects one job for a details view, or `None` if unknown.
#[must_use]
pub fn job_details(state: &MemoryState, id: JobId) -> Option<JobDetails> {
    let job = state.job_get(id)?;
    Some(JobDetails {
        id,
        current_state: job.current_state_name().map(str::to_string),
        parameters: job.parameters.clone(),
        history_length: job.state_history.len(),
    })
}

/// A page of up to `count` job ids in `state_name`, starting at `from`.
#[must_use]
pub fn paginated_state_listing(state: &MemoryState, state_name: &str, from: usize, count: usize) -> JobPage {
    let all = state.ids_in_state(state_name);
    let total = all.len();
    let ids = all.into_iter().skip(from).take(count).collect();
    JobPage { ids, total }
}

/// Daily timeline for `stat_type` over the last 7 days (including today),
/// oldest first. Reads `stats:{stat_type}:yyyy-MM-dd` counters; the core
/// only serves these values, it never increments them itself -- the
/// surrounding framework's instrumentation does that.
#[must_use]
pub fn daily_timeline(
    state: &MemoryState,
    anchor: &jobstore_core::ClockAnchor,
    now: MonoTime,
    stat_type: &str,
) -> Vec<TimelinePoint> {
    let today = unix_millis_to_utc(now.to_unix_millis(anchor)).date_naive();
    (0..7)
        .rev()
        .map(|days_ago| {
            let day = today - chrono::Duration::days(days_ago);
            let key = format!("stats:{stat_type}:{}", day.format("%Y-%m-%d"));
            timeline_point(state, key, day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
        })
        .collect()
}

/// Hourly timeline for `stat_type` over the last 24 hours (including the
/// current hour), oldest first. Reads `stats:{stat_type}:yyyy-MM-dd-HH`
/// counters.
#[must_use]
pub fn hourly_timeline(
    state: &MemoryState,
    anchor: &jobstore_core::ClockAnchor,
    now: MonoTime,
    stat_type: &str,
) -> Vec<TimelinePoint> {
    let now_utc = unix_millis_to_utc(now.to_unix_millis(anchor));
    let current_hour = now_utc
        .date_naive()
        .and_hms_opt(now_utc.time().hour(), 0, 0)
        .unwrap_or_default()
        .and_utc();
    (0..24)
        .rev()
        .map(|hours_ago| {
            let bucket = current_hour - chrono::Duration::hours(hours_ago);
            let key = format!("stats:{stat_type}:{}", bucket.format("%Y-%m-%d-%H"));
            timeline_point(state, key, bucket)
        })
        .collect()
}

fn timeline_point(state: &MemoryState, key: String, bucket_start: chrono::DateTime<chrono::Utc>) -> TimelinePoint {
    let count = state.counter_get(&key).map_or(0, |c| c.value);
    TimelinePoint { key, timestamp_millis: bucket_start.timestamp_millis(), count }
}

fn unix_millis_to_utc(millis: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(millis).unwrap_or(chrono::DateTime::UNIX_EPOCH)
}

/// Aggregate dashboard statistics, reading the framework-maintained counter
/// and sorted-set keys.
#[must_use]
pub fn statistics_summary(state: &MemoryState, known_states: &[&str]) -> StatisticsSummary {
    let mut counts_by_state = std::collections::BTreeMap::new();
    for name in known_states {
        counts_by_state.insert((*name).to_string(), state.count_in_state(name));
    }
    StatisticsSummary {
        counts_by_state,
        succeeded_total: state.counter_get("stats:succeeded").map_or(0, |c| c.value),
        deleted_total: state.counter_get("stats:deleted").map_or(0, |c| c.value),
        recurring_count: state.set_get("recurring-jobs").map_or(0, |s| s.len()),
        retries_count: state.set_get("retries").map_or(0, |s| s.len()),
    }
}
