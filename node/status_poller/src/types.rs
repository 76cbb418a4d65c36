use std::fmt;

use vise::{EncodeLabelSet, EncodeLabelValue};

/// Kind of DMS resources polled by the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Migration job between a source and a target data store.
    ReplicationTask,
    /// Managed compute instance executing replication tasks.
    ReplicationInstance,
}

impl ResourceKind {
    pub const ALL: [Self; 2] = [Self::ReplicationTask, Self::ReplicationInstance];

    /// Status reported by the DMS API for a healthy resource of this kind.
    pub const fn healthy_status(self) -> &'static str {
        match self {
            Self::ReplicationTask => "running",
            Self::ReplicationInstance => "available",
        }
    }

    /// Name of the DMS API operation listing resources of this kind.
    pub const fn describe_operation(self) -> &'static str {
        match self {
            Self::ReplicationTask => "DescribeReplicationTasks",
            Self::ReplicationInstance => "DescribeReplicationInstances",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReplicationTask => "replication_task",
            Self::ReplicationInstance => "replication_instance",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Status of a single resource as returned by a describe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub id: String,
    pub status: String,
}

impl ResourceStatus {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}
