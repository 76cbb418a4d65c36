use std::{env, ffi::OsString, time::Duration};

use anyhow::Context as _;
use serde::Deserialize;

/// Prefix of environment variables read by [`ExporterConfig::from_env()`].
pub const ENV_PREFIX: &str = "DMS_EXPORTER_";

/// Converts environment variables to strings. Variables with non-UTF-8 names or values cannot configure
/// the exporter and are skipped.
pub(crate) fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
}

/// Configuration of the exporter: where to serve metrics, which AWS account / region to poll and how often.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExporterConfig {
    /// Address the metrics server binds to. `:PORT` means all IPv4 interfaces.
    #[serde(default = "ExporterConfig::default_listen_address")]
    pub listen_address: String,
    /// AWS region to query.
    #[serde(default = "ExporterConfig::default_region")]
    pub region: String,
    /// ARN of the role to assume. Empty means that ambient credentials are used as is.
    #[serde(default)]
    pub role: String,
    /// Custom endpoint for AWS services (e.g., a local emulator). Empty means the default endpoints.
    #[serde(default)]
    pub endpoint_url: String,
    /// Session name used when assuming [`Self::role`].
    #[serde(default = "ExporterConfig::default_role_session_name")]
    pub role_session_name: String,
    /// Interval between two polls of the same resource kind.
    #[serde(default = "ExporterConfig::default_poll_interval_sec")]
    pub poll_interval_sec: u64,
    /// Upper bound on a single AWS API operation, including SDK-level retries.
    #[serde(default = "ExporterConfig::default_api_timeout_sec")]
    pub api_timeout_sec: u64,
    /// Amount of time the exporter waits for its tasks to finish after a stop signal.
    #[serde(default = "ExporterConfig::default_graceful_shutdown_timeout_sec")]
    pub graceful_shutdown_timeout_sec: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: Self::default_listen_address(),
            region: Self::default_region(),
            role: String::new(),
            endpoint_url: String::new(),
            role_session_name: Self::default_role_session_name(),
            poll_interval_sec: Self::default_poll_interval_sec(),
            api_timeout_sec: Self::default_api_timeout_sec(),
            graceful_shutdown_timeout_sec: Self::default_graceful_shutdown_timeout_sec(),
        }
    }
}

impl ExporterConfig {
    fn default_listen_address() -> String {
        ":8080".to_owned()
    }

    fn default_region() -> String {
        "us-west-2".to_owned()
    }

    fn default_role_session_name() -> String {
        "assumeTestRole".to_owned()
    }

    /// Default poll interval -- 45s
    const fn default_poll_interval_sec() -> u64 {
        45
    }

    /// Default API timeout -- 30s
    const fn default_api_timeout_sec() -> u64 {
        30
    }

    /// Default graceful shutdown timeout -- 5s
    const fn default_graceful_shutdown_timeout_sec() -> u64 {
        5
    }

    /// Loads the config from `DMS_EXPORTER_*` environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_iter(utf8_vars(env::vars_os()))
    }

    /// Same as [`Self::from_env()`], but with explicitly provided variables.
    pub fn from_env_iter<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .context("failed parsing exporter config")
    }

    /// Role to assume, if any.
    pub fn role(&self) -> Option<&str> {
        let role = self.role.trim();
        (!role.is_empty()).then_some(role)
    }

    /// Custom AWS endpoint, if any.
    pub fn endpoint_url(&self) -> Option<&str> {
        let url = self.endpoint_url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Returns addresses to bind the metrics server to, in the order of preference. A bare `:PORT`
    /// means all interfaces: the dual-stack IPv6 wildcard, with the IPv4 wildcard as a fallback for hosts
    /// without IPv6.
    pub fn bind_addresses(&self) -> Vec<String> {
        if self.listen_address.starts_with(':') {
            vec![
                format!("[::]{}", self.listen_address),
                format!("0.0.0.0{}", self.listen_address),
            ]
        } else {
            vec![self.listen_address.clone()]
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_sec)
    }

    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_timeout_sec)
    }

    /// Checks invariants that cannot be expressed by types.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.poll_interval_sec > 0,
            "poll interval must be positive"
        );
        anyhow::ensure!(self.api_timeout_sec > 0, "API timeout must be positive");
        anyhow::ensure!(!self.region.trim().is_empty(), "region must not be empty");
        anyhow::ensure!(
            !self.listen_address.is_empty(),
            "listen address must not be empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Vec<(String, String)> {
        vars.iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn defaults_are_used_for_missing_vars() {
        let config = ExporterConfig::from_env_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, ExporterConfig::default());
        assert_eq!(config.listen_address, ":8080");
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.role(), None);
        assert_eq!(config.poll_interval(), Duration::from_secs(45));
        config.validate().unwrap();
    }

    #[test]
    fn parsing_from_env() {
        let config = ExporterConfig::from_env_iter(env(&[
            ("DMS_EXPORTER_LISTEN_ADDRESS", "127.0.0.1:9100"),
            ("DMS_EXPORTER_REGION", "eu-central-1"),
            ("DMS_EXPORTER_ROLE", "arn:aws:iam::123456789012:role/dms-read"),
            ("DMS_EXPORTER_POLL_INTERVAL_SEC", "10"),
            ("DMS_EXPORTER_API_TIMEOUT_SEC", "3"),
            ("UNRELATED_VAR", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addresses(), ["127.0.0.1:9100"]);
        assert_eq!(config.region, "eu-central-1");
        assert_eq!(
            config.role(),
            Some("arn:aws:iam::123456789012:role/dms-read")
        );
        assert_eq!(config.role_session_name, "assumeTestRole");
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.api_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn bare_port_binds_all_interfaces() {
        let config = ExporterConfig::default();
        assert_eq!(config.bind_addresses(), ["[::]:8080", "0.0.0.0:8080"]);
    }

    #[test]
    fn parsing_endpoint_url() {
        let config = ExporterConfig::from_env_iter(env(&[(
            "DMS_EXPORTER_ENDPOINT_URL",
            "http://localhost:4566",
        )]))
        .unwrap();
        assert_eq!(config.endpoint_url(), Some("http://localhost:4566"));
        assert_eq!(ExporterConfig::default().endpoint_url(), None);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_vars_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("DMS_EXPORTER_REGION"), OsString::from("eu-west-3")),
            (OsString::from("DMS_EXPORTER_ROLE"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0x80]), OsString::from("value")),
        ];
        let config = ExporterConfig::from_env_iter(utf8_vars(vars)).unwrap();
        assert_eq!(config.region, "eu-west-3");
        assert_eq!(config.role(), None);
    }

    #[test]
    fn blank_role_disables_assumption() {
        let config = ExporterConfig {
            role: "  ".to_owned(),
            ..ExporterConfig::default()
        };
        assert_eq!(config.role(), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        ExporterConfig::from_env_iter(env(&[("DMS_EXPORTER_POLL_INTERVAL_SEC", "soon")]))
            .unwrap_err();

        let config = ExporterConfig {
            poll_interval_sec: 0,
            ..ExporterConfig::default()
        };
        config.validate().unwrap_err();
    }
}
