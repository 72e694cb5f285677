//! Monitoring façade: read-only dashboard projections.

use std::sync::Arc;

use jobstore_core::{ClockAnchor, JobId};

use crate::commands::monitoring::{
    self, JobDetails, JobPage, QueueSummary, ServerSummary, StatisticsSummary, TimelinePoint,
};
use crate::dispatcher::Dispatcher;
use crate::errors::StorageError;
use crate::queue_engine::QueueEngine;

/// State names this crate's dashboards know how to bucket by, mirroring
/// the framework's customary job lifecycle.
pub const KNOWN_STATES: &[&str] =
    &["Enqueued", "Processing", "Scheduled", "Succeeded", "Failed", "Deleted", "Awaiting"];

/// Read-only projections over jobs, queues, servers, and aggregate counters.
pub struct MonitoringFacade {
    dispatcher: Dispatcher,
    queues: Arc<QueueEngine>,
    anchor: ClockAnchor,
}

impl MonitoringFacade {
    #[must_use]
    pub(crate) fn new(dispatcher: Dispatcher, queues: Arc<QueueEngine>, anchor: ClockAnchor) -> Self {
        Self { dispatcher, queues, anchor }
    }

    /// A queue's length and a top-5 preview of enqueued jobs. Reads the
    /// queue engine directly since queue content does not live in
    /// `MemoryState`.
    #[must_use]
    pub fn queue_summary(&self, name: &str) -> QueueSummary {
        monitoring::queue_summary(name, &self.queues.contents(name))
    }

    /// Every registered server's monitoring projection.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn server_summaries(&self) -> Result<Vec<ServerSummary>, StorageError> {
        let anchor = self.anchor;
        self.dispatcher.submit_read(move |state, _now| monitoring::server_summaries(state, &anchor)).await
    }

    /// One job's details view, or `None` if unknown.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn job_details(&self, id: JobId) -> Result<Option<JobDetails>, StorageError> {
        self.dispatcher.submit_read(move |state, _now| monitoring::job_details(state, id)).await
    }

    /// A page of up to `count` job ids in `state_name`, starting at `from`.
    /// Used for the enqueued/processing/scheduled/succeeded/failed/deleted/
    /// awaiting listings, all of which key off the same job-state index.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn paginated_state_listing(
        &self,
        state_name: &str,
        from: usize,
        count: usize,
    ) -> Result<JobPage, StorageError> {
        let state_name = state_name.to_string();
        self.dispatcher
            .submit_read(move |state, _now| monitoring::paginated_state_listing(state, &state_name, from, count))
            .await
    }

    /// Aggregate dashboard statistics over [`KNOWN_STATES`], the fixed
    /// succeeded/deleted counters, and the recurring-jobs/retries sorted sets.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn statistics_summary(&self) -> Result<StatisticsSummary, StorageError> {
        self.dispatcher.submit_read(|state, _now| monitoring::statistics_summary(state, KNOWN_STATES)).await
    }

    /// Daily timeline for `stat_type` over the last 7 days, oldest first.
    /// Reads `stats:{stat_type}:yyyy-MM-dd` counters maintained by the
    /// surrounding framework's instrumentation.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn daily_timeline(&self, stat_type: &str) -> Result<Vec<TimelinePoint>, StorageError> {
        let anchor = self.anchor;
        let stat_type = stat_type.to_string();
        self.dispatcher
            .submit_read(move |state, now| monitoring::daily_timeline(state, &anchor, now, &stat_type))
            .await
    }

    /// Hourly timeline for `stat_type` over the last 24 hours, oldest first.
    /// Reads `stats:{stat_type}:yyyy-MM-dd-HH` counters.
    ///
    /// # Errors
    /// Propagates a dispatcher failure, if any.
    pub async fn hourly_timeline(&self, stat_type: &str) -> Result<Vec<TimelinePoint>, StorageError> {
        let anchor = self.anchor;
        let stat_type = stat_type.to_string();
        self.dispatcher
            .submit_read(move |state, now| monitoring::hourly_timeline(state, &anchor, now, &stat_type))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::jobs::{CreateJob, SetJobState};
    use crate::commands::SubCommand;
    use crate::config::EngineConfig;
    use crate::state::MemoryState;
    use jobstore_core::{InvocationData, SystemMonoClock};
    use std::collections::BTreeMap;

    fn facade() -> MonitoringFacade {
        let queues = Arc::new(QueueEngine::new());
        let dispatcher = Dispatcher::spawn(EngineConfig::default(), Arc::new(SystemMonoClock), queues.clone());
        MonitoringFacade::new(dispatcher, queues, ClockAnchor::capture_now())
    }

    #[tokio::test]
    async fn queue_summary_previews_up_to_five() {
        let monitoring_facade = facade();
        for i in 0..7_u128 {
            monitoring_facade.queues.push("default", JobId::from_raw(i));
        }
        let summary = monitoring_facade.queue_summary("default");
        assert_eq!(summary.length, 7);
        assert_eq!(summary.preview.len(), 5);
    }

    #[tokio::test]
    async fn statistics_summary_counts_enqueued_jobs() {
        let monitoring_facade = facade();
        monitoring_facade
            .dispatcher
            .submit_write(|state: &mut MemoryState, now| {
                let id = JobId::from_raw(1);
                CreateJob {
                    id,
                    invocation_data: InvocationData { type_tag: "T".to_string(), payload: vec![] },
                    parameters: BTreeMap::new(),
                    expire_in: None,
                }
                .execute(state, now)
                .unwrap();
                SetJobState { id, name: "Enqueued".to_string(), reason: None, data: BTreeMap::new() }
                    .execute(state, now)
                    .unwrap();
                ((), Vec::new())
            })
            .await
            .unwrap();

        let stats = monitoring_facade.statistics_summary().await.unwrap();
        assert_eq!(stats.counts_by_state.get("Enqueued"), Some(&1));
    }

    #[tokio::test]
    async fn daily_and_hourly_timelines_have_the_documented_bucket_counts() {
        let monitoring_facade = facade();
        let days = monitoring_facade.daily_timeline("succeeded").await.unwrap();
        assert_eq!(days.len(), 7);
        let hours = monitoring_facade.hourly_timeline("succeeded").await.unwrap();
        assert_eq!(hours.len(), 24);
    }
}
