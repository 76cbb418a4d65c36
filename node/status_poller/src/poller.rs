use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use aws_sdk_databasemigration::error::DisplayErrorContext;
use dms_exporter_periodic_job::PeriodicJob;

use crate::{
    errors::PollError,
    mapping::map_statuses,
    metrics::{PollLabels, PollOutcome, POLLER_METRICS},
    source::StatusSource,
    store::GaugeStore,
    types::ResourceKind,
};

/// Periodically polls statuses of a single [`ResourceKind`] and merges them into the [`GaugeStore`].
///
/// Cycles are sequential: all gauges from a cycle are set before the next cycle starts. A failed cycle
/// leaves gauges untouched; the next tick is the only retry mechanism.
#[derive(Debug)]
pub struct StatusPoller {
    kind: ResourceKind,
    source: Arc<dyn StatusSource>,
    store: GaugeStore,
    polling_interval: Duration,
}

impl StatusPoller {
    pub fn new(
        kind: ResourceKind,
        source: Arc<dyn StatusSource>,
        store: GaugeStore,
        polling_interval: Duration,
    ) -> Self {
        Self {
            kind,
            source,
            store,
            polling_interval,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Runs a single poll cycle. Returns the number of distinct resources whose gauges were set.
    pub async fn poll(&self) -> Result<usize, PollError> {
        let latency = POLLER_METRICS.fetch_latency[&self.kind].start();
        let statuses = self.source.fetch(self.kind).await?;
        let latency = latency.observe();
        POLLER_METRICS.fetched_resources[&self.kind].set(statuses.len());

        let values = map_statuses(&statuses, self.kind.healthy_status());
        self.store.merge(self.kind, &values);
        tracing::debug!(
            kind = %self.kind,
            ?latency,
            "Merged statuses of {} resources",
            values.len()
        );
        Ok(values.len())
    }
}

#[async_trait]
impl PeriodicJob for StatusPoller {
    fn service_name(&self) -> &'static str {
        match self.kind {
            ResourceKind::ReplicationTask => "ReplicationTaskPoller",
            ResourceKind::ReplicationInstance => "ReplicationInstancePoller",
        }
    }

    async fn run_routine_task(&mut self) -> anyhow::Result<()> {
        let kind = self.kind;
        let result = self.poll().await;
        let outcome = match &result {
            Ok(_) => PollOutcome::Success,
            Err(err) => PollOutcome::from(err),
        };
        POLLER_METRICS.poll_cycles[&PollLabels { kind, outcome }].inc();

        match result {
            Ok(resource_count) => {
                tracing::info!(%kind, resource_count, "Checked DMS resources");
            }
            Err(err @ PollError::Credentials(_)) => {
                tracing::error!(
                    %kind,
                    "Cannot obtain AWS credentials, skipping poll cycle: {}",
                    DisplayErrorContext(&err)
                );
            }
            Err(err @ PollError::Api { .. }) => {
                tracing::warn!(
                    %kind,
                    "Error gathering DMS resources, keeping previous gauge values: {}",
                    DisplayErrorContext(&err)
                );
            }
        }
        Ok(())
    }

    fn polling_interval(&self) -> Duration {
        self.polling_interval
    }
}
