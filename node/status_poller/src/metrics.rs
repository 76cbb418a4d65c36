use std::time::Duration;

use vise::{
    Buckets, Counter, EncodeLabelSet, EncodeLabelValue, Family, Gauge, Histogram, Metrics, Unit,
};

use crate::{errors::PollError, types::ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue)]
#[metrics(rename_all = "snake_case")]
pub(crate) enum PollOutcome {
    Success,
    CredentialsError,
    ApiError,
}

impl From<&PollError> for PollOutcome {
    fn from(err: &PollError) -> Self {
        match err {
            PollError::Credentials(_) => Self::CredentialsError,
            PollError::Api { .. } => Self::ApiError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelSet)]
pub(crate) struct PollLabels {
    pub kind: ResourceKind,
    pub outcome: PollOutcome,
}

#[derive(Debug, Metrics)]
#[metrics(prefix = "dms_exporter")]
pub(crate) struct PollerMetrics {
    /// Number of completed poll cycles, by resource kind and outcome.
    pub poll_cycles: Family<PollLabels, Counter>,
    /// Latency of listing resources via the DMS API, including credential resolution.
    #[metrics(buckets = Buckets::LATENCIES, unit = Unit::Seconds)]
    pub fetch_latency: Family<ResourceKind, Histogram<Duration>>,
    /// Number of resources returned by the last successful fetch.
    pub fetched_resources: Family<ResourceKind, Gauge<usize>>,
}

#[vise::register]
pub(crate) static POLLER_METRICS: vise::Global<PollerMetrics> = vise::Global::new();
