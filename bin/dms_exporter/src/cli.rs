use clap::Parser;
use dms_exporter_config::{ExporterConfig, ObservabilityConfig};

/// Command-line options. Every option overrides the corresponding `DMS_EXPORTER_*` env variable.
#[derive(Debug, Default, Parser)]
#[command(
    name = "dms_exporter",
    version,
    about = "Exports status of AWS DMS replication tasks and instances as Prometheus gauges"
)]
pub(crate) struct Cli {
    /// The address to listen on for HTTP requests, e.g. `:8080` or `127.0.0.1:8080`.
    #[arg(long)]
    pub listen_address: Option<String>,
    /// AWS region to use.
    #[arg(long)]
    pub region: Option<String>,
    /// AWS role ARN to assume if required. An empty value disables role assumption.
    #[arg(long)]
    pub role: Option<String>,
    /// Custom endpoint for AWS services, e.g. a local emulator.
    #[arg(long)]
    pub endpoint_url: Option<String>,
    /// Session name used when assuming the role.
    #[arg(long)]
    pub role_session_name: Option<String>,
    /// Interval between two polls of the same resource kind, in seconds.
    #[arg(long)]
    pub poll_interval_sec: Option<u64>,
    /// Timeout of a single AWS API operation, in seconds.
    #[arg(long)]
    pub api_timeout_sec: Option<u64>,
    /// Time to wait for tasks to finish after a stop signal, in seconds.
    #[arg(long)]
    pub graceful_shutdown_timeout_sec: Option<u64>,
    /// Log format: `plain` or `json`.
    #[arg(long)]
    pub log_format: Option<String>,
    /// Log directives in the `RUST_LOG` format.
    #[arg(long)]
    pub log_directives: Option<String>,
}

impl Cli {
    pub fn override_exporter_config(&self, mut config: ExporterConfig) -> ExporterConfig {
        if let Some(listen_address) = &self.listen_address {
            config.listen_address.clone_from(listen_address);
        }
        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if let Some(role) = &self.role {
            config.role.clone_from(role);
        }
        if let Some(endpoint_url) = &self.endpoint_url {
            config.endpoint_url.clone_from(endpoint_url);
        }
        if let Some(role_session_name) = &self.role_session_name {
            config.role_session_name.clone_from(role_session_name);
        }
        if let Some(poll_interval_sec) = self.poll_interval_sec {
            config.poll_interval_sec = poll_interval_sec;
        }
        if let Some(api_timeout_sec) = self.api_timeout_sec {
            config.api_timeout_sec = api_timeout_sec;
        }
        if let Some(timeout_sec) = self.graceful_shutdown_timeout_sec {
            config.graceful_shutdown_timeout_sec = timeout_sec;
        }
        config
    }

    pub fn override_observability_config(
        &self,
        mut config: ObservabilityConfig,
    ) -> ObservabilityConfig {
        if let Some(log_format) = &self.log_format {
            config.log_format.clone_from(log_format);
        }
        if let Some(log_directives) = &self.log_directives {
            config.log_directives.clone_from(log_directives);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn no_args_keep_config() {
        let cli = Cli::try_parse_from(["dms_exporter"]).unwrap();
        let base = ExporterConfig {
            region: "ap-south-1".to_owned(),
            ..ExporterConfig::default()
        };
        assert_eq!(cli.override_exporter_config(base.clone()), base);
    }

    #[test]
    fn args_override_config() {
        let cli = Cli::try_parse_from([
            "dms_exporter",
            "--listen-address",
            ":9100",
            "--region",
            "eu-north-1",
            "--role",
            "arn:aws:iam::123456789012:role/dms-read",
            "--endpoint-url",
            "http://localhost:4566",
            "--poll-interval-sec",
            "60",
            "--log-format",
            "json",
        ])
        .unwrap();

        let config = cli.override_exporter_config(ExporterConfig::default());
        assert_eq!(config.bind_addresses(), ["[::]:9100", "0.0.0.0:9100"]);
        assert_eq!(config.region, "eu-north-1");
        assert_eq!(config.role(), Some("arn:aws:iam::123456789012:role/dms-read"));
        assert_eq!(config.endpoint_url(), Some("http://localhost:4566"));
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.api_timeout(), Duration::from_secs(30));

        let observability = cli.override_observability_config(ObservabilityConfig::default());
        assert_eq!(observability.log_format, "json");
        assert_eq!(observability.log_directives, "info");
    }

    #[test]
    fn empty_role_disables_env_role() {
        let cli = Cli::try_parse_from(["dms_exporter", "--role", ""]).unwrap();
        let base = ExporterConfig {
            role: "arn:aws:iam::123456789012:role/dms-read".to_owned(),
            ..ExporterConfig::default()
        };
        assert_eq!(cli.override_exporter_config(base).role(), None);
    }

    #[test]
    fn invalid_args_are_rejected() {
        Cli::try_parse_from(["dms_exporter", "--poll-interval-sec", "often"]).unwrap_err();
        Cli::try_parse_from(["dms_exporter", "--unknown"]).unwrap_err();
    }
}
