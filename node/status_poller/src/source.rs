use std::fmt;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_databasemigration::Client;

use crate::{
    credentials::CredentialResolver,
    errors::PollError,
    types::{ResourceKind, ResourceStatus},
};

/// Source of DMS resource statuses.
#[async_trait]
pub trait StatusSource: fmt::Debug + Send + Sync + 'static {
    /// Lists all resources of the specified kind. A single call corresponds to a single poll cycle.
    async fn fetch(&self, kind: ResourceKind) -> Result<Vec<ResourceStatus>, PollError>;
}

/// [`StatusSource`] backed by the AWS DMS API. Both resource kinds share a single [`CredentialResolver`],
/// and thus cached credentials.
#[derive(Debug)]
pub struct AwsStatusSource {
    resolver: CredentialResolver,
}

impl AwsStatusSource {
    pub fn new(resolver: CredentialResolver) -> Self {
        Self { resolver }
    }

    /// Lists all replication tasks, following pagination markers.
    pub async fn describe_replication_tasks(
        config: &SdkConfig,
    ) -> Result<Vec<ResourceStatus>, PollError> {
        let operation = ResourceKind::ReplicationTask.describe_operation();
        let client = Client::new(config);
        // Task settings are large JSON documents we don't need.
        let mut pages = client
            .describe_replication_tasks()
            .without_settings(true)
            .into_paginator()
            .send();

        let mut statuses = vec![];
        while let Some(page) = pages
            .try_next()
            .await
            .map_err(|err| PollError::api(operation, err))?
        {
            statuses.extend(page.replication_tasks().iter().filter_map(|task| {
                resource_status(
                    ResourceKind::ReplicationTask,
                    task.replication_task_identifier(),
                    task.status(),
                )
            }));
        }
        Ok(statuses)
    }

    /// Lists all replication instances, following pagination markers.
    pub async fn describe_replication_instances(
        config: &SdkConfig,
    ) -> Result<Vec<ResourceStatus>, PollError> {
        let operation = ResourceKind::ReplicationInstance.describe_operation();
        let client = Client::new(config);
        let mut pages = client
            .describe_replication_instances()
            .into_paginator()
            .send();

        let mut statuses = vec![];
        while let Some(page) = pages
            .try_next()
            .await
            .map_err(|err| PollError::api(operation, err))?
        {
            statuses.extend(page.replication_instances().iter().filter_map(|instance| {
                resource_status(
                    ResourceKind::ReplicationInstance,
                    instance.replication_instance_identifier(),
                    instance.replication_instance_status(),
                )
            }));
        }
        Ok(statuses)
    }
}

#[async_trait]
impl StatusSource for AwsStatusSource {
    async fn fetch(&self, kind: ResourceKind) -> Result<Vec<ResourceStatus>, PollError> {
        let config = self.resolver.resolve().await?;
        match kind {
            ResourceKind::ReplicationTask => Self::describe_replication_tasks(&config).await,
            ResourceKind::ReplicationInstance => {
                Self::describe_replication_instances(&config).await
            }
        }
    }
}

/// Converts an item of a describe response. Items without an identifier cannot be keyed and are skipped;
/// a missing status is treated as an empty (i.e., unhealthy) one.
pub(crate) fn resource_status(
    kind: ResourceKind,
    id: Option<&str>,
    status: Option<&str>,
) -> Option<ResourceStatus> {
    let Some(id) = id else {
        tracing::warn!(%kind, ?status, "DMS returned a resource without identifier; skipping");
        return None;
    };
    Some(ResourceStatus::new(id, status.unwrap_or_default()))
}
