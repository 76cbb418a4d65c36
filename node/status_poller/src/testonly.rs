//! Test utilities.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use crate::{
    errors::{CredentialError, PollError},
    source::StatusSource,
    types::{ResourceKind, ResourceStatus},
};

#[derive(Debug, Clone)]
pub(crate) enum MockResponse {
    Statuses(Vec<ResourceStatus>),
    ApiError(&'static str),
    MissingCredentials,
}

/// [`StatusSource`] returning preset responses, one per kind. A response is returned for every fetch until replaced.
#[derive(Debug, Default)]
pub(crate) struct MockStatusSource {
    responses: Mutex<HashMap<ResourceKind, MockResponse>>,
    fetch_counts: Mutex<HashMap<ResourceKind, usize>>,
}

impl MockStatusSource {
    pub fn set_response(&self, kind: ResourceKind, response: MockResponse) {
        self.responses.lock().unwrap().insert(kind, response);
    }

    pub fn set_statuses(&self, kind: ResourceKind, statuses: &[(&str, &str)]) {
        let statuses = statuses
            .iter()
            .map(|&(id, status)| ResourceStatus::new(id, status))
            .collect();
        self.set_response(kind, MockResponse::Statuses(statuses));
    }

    pub fn fetch_count(&self, kind: ResourceKind) -> usize {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl StatusSource for MockStatusSource {
    async fn fetch(&self, kind: ResourceKind) -> Result<Vec<ResourceStatus>, PollError> {
        *self.fetch_counts.lock().unwrap().entry(kind).or_default() += 1;
        let response = self.responses.lock().unwrap().get(&kind).cloned();
        match response.unwrap_or(MockResponse::Statuses(vec![])) {
            MockResponse::Statuses(statuses) => Ok(statuses),
            MockResponse::ApiError(message) => Err(PollError::Api {
                operation: kind.describe_operation(),
                source: anyhow::anyhow!(message),
            }),
            MockResponse::MissingCredentials => Err(CredentialError::MissingProvider.into()),
        }
    }
}
