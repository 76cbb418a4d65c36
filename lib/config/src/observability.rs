use std::env;

use anyhow::Context as _;
use serde::Deserialize;

use crate::exporter::{utf8_vars, ENV_PREFIX};

/// Variable used for log directives if `DMS_EXPORTER_LOG_DIRECTIVES` is not set.
const RUST_LOG_VAR: &str = "RUST_LOG";

/// Configuration of the logging stack.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObservabilityConfig {
    /// Format of the logs as expected by the `vlog` crate.
    /// Currently must be either `plain` or `json`.
    #[serde(default = "ObservabilityConfig::default_log_format")]
    pub log_format: String,
    /// Log directives in format that is used in `RUST_LOG`. Falls back to `RUST_LOG`.
    #[serde(default = "ObservabilityConfig::default_log_directives")]
    pub log_directives: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: Self::default_log_format(),
            log_directives: Self::default_log_directives(),
        }
    }
}

impl ObservabilityConfig {
    fn default_log_format() -> String {
        "plain".to_owned()
    }

    fn default_log_directives() -> String {
        "info".to_owned()
    }

    /// Reads the config from `DMS_EXPORTER_LOG_FORMAT` and `DMS_EXPORTER_LOG_DIRECTIVES` / `RUST_LOG`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_iter(utf8_vars(env::vars_os()))
    }

    pub fn from_env_iter<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars: Vec<_> = vars.into_iter().collect();
        let directives_var = format!("{ENV_PREFIX}LOG_DIRECTIVES");
        if !vars.iter().any(|(name, _)| *name == directives_var) {
            let rust_log = vars
                .iter()
                .find(|(name, _)| name == RUST_LOG_VAR)
                .map(|(_, value)| value.clone());
            if let Some(rust_log) = rust_log {
                vars.push((directives_var, rust_log));
            }
        }

        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .context("failed parsing observability config")
    }
}
