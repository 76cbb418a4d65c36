//! Polling of AWS Database Migration Service (DMS) resources and mapping of their statuses to `up` gauges.
//!
//! Two resource kinds are polled: replication tasks (healthy when `running`) and replication instances
//! (healthy when `available`). Each kind is handled by its own [`StatusPoller`]; both write
//! into a shared [`GaugeStore`] which is rendered by the metrics endpoint.

pub use crate::{
    credentials::{AssumedRole, CredentialResolver},
    errors::{CredentialError, PollError},
    mapping::map_statuses,
    poller::StatusPoller,
    source::{AwsStatusSource, StatusSource},
    store::{gauge_name, GaugeStore},
    types::{ResourceKind, ResourceStatus},
};

mod credentials;
mod errors;
mod mapping;
mod metrics;
mod poller;
mod source;
mod store;
#[cfg(test)]
mod testonly;
mod types;
