//! Configuration of the DMS exporter.
//!
//! Values come from `DMS_EXPORTER_*` environment variables; the binary applies CLI overrides on top.

pub use crate::{
    exporter::{ExporterConfig, ENV_PREFIX},
    observability::ObservabilityConfig,
};

mod exporter;
mod observability;
