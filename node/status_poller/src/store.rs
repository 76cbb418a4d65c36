use std::{collections::BTreeMap, fmt, sync::Arc};

use vise::{Format, Gauge, LabeledFamily, Metrics, Registry};

use crate::types::ResourceKind;

/// Gauges published for DMS resources. Metric names are relied upon by dashboards and alerts;
/// don't change them.
#[derive(Debug, Metrics)]
#[metrics(prefix = "aws_database_migration_service")]
struct DmsMetrics {
    /// AWS Database Migration Task Status
    #[metrics(labels = ["id"])]
    migration_task_up: LabeledFamily<String, Gauge<u64>>,
    /// AWS Database Migration Instance Status
    #[metrics(labels = ["id"])]
    migration_instance_up: LabeledFamily<String, Gauge<u64>>,
}

impl DmsMetrics {
    fn family(&self, kind: ResourceKind) -> &LabeledFamily<String, Gauge<u64>> {
        match kind {
            ResourceKind::ReplicationTask => &self.migration_task_up,
            ResourceKind::ReplicationInstance => &self.migration_instance_up,
        }
    }
}

struct GaugeStoreInner {
    metrics: DmsMetrics,
    registry: Registry,
}

impl fmt::Debug for GaugeStoreInner {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GaugeStoreInner")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// Store of `up` gauges for all resource kinds.
///
/// Each gauge is an atomic, so concurrent readers observe either the previous or the new value of every key.
/// Entries are only ever set; a resource that disappears from the DMS API keeps its last value.
#[derive(Debug, Clone)]
pub struct GaugeStore(Arc<GaugeStoreInner>);

impl Default for GaugeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeStore {
    pub fn new() -> Self {
        let metrics = DmsMetrics::default();
        let mut registry = Registry::empty();
        registry.register_metrics(&metrics);
        Self(Arc::new(GaugeStoreInner { metrics, registry }))
    }

    /// Sets gauges for all provided IDs of the specified kind. Gauges of other IDs and other kinds are not touched.
    pub fn merge(&self, kind: ResourceKind, values: &BTreeMap<String, u64>) {
        let family = self.0.metrics.family(kind);
        for (id, &value) in values {
            family[id].set(value);
        }
    }

    /// Registers the store gauges in an external registry (e.g., the one served by the metrics endpoint).
    pub fn register(&self, registry: &mut Registry) {
        registry.register_metrics(&self.0.metrics);
    }

    /// Encodes the store gauges only.
    pub fn encode(&self, format: Format) -> Result<String, fmt::Error> {
        let mut buffer = String::new();
        self.0.registry.encode(&mut buffer, format)?;
        Ok(buffer)
    }
}

/// Metric family name of the `up` gauge for the specified kind.
pub fn gauge_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::ReplicationTask => "aws_database_migration_service_migration_task_up",
        ResourceKind::ReplicationInstance => "aws_database_migration_service_migration_instance_up",
    }
}
