use std::{backtrace::Backtrace, fmt, panic, str::FromStr};

use tracing_subscriber::{registry::LookupSpan, EnvFilter, Layer};

/// Output format of the logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Plain => "plain",
            Self::Json => "json",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported log format `{0}`; expected `plain` or `json`")]
pub struct LogFormatError(String);

impl FromStr for LogFormat {
    type Err = LogFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(LogFormatError(other.to_owned())),
        }
    }
}

/// Logs layer configuration.
#[derive(Debug, Default)]
pub struct Logs {
    format: LogFormat,
    log_directives: Option<String>,
}

impl From<LogFormat> for Logs {
    fn from(format: LogFormat) -> Self {
        Self {
            format,
            log_directives: None,
        }
    }
}

impl Logs {
    pub fn new(format: &str) -> Result<Self, LogFormatError> {
        Ok(Self::from(format.parse::<LogFormat>()?))
    }

    /// Sets `RUST_LOG`-style directives. If not set, `info` is used.
    pub fn with_log_directives(mut self, log_directives: Option<String>) -> Self {
        self.log_directives = log_directives;
        self
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Routes panics through `tracing`, so that they end up in the same sink (and format) as other logs.
    pub(crate) fn install_panic_hook(&self) {
        panic::set_hook(Box::new(|panic_info| {
            let backtrace = Backtrace::force_capture();
            tracing::error!(
                panic.location = ?panic_info.location(),
                panic.backtrace = %backtrace,
                "{panic_info}"
            );
        }));
    }

    pub(crate) fn build_filter(&self) -> EnvFilter {
        let directives = self.log_directives.as_deref().unwrap_or("info");
        EnvFilter::builder().parse_lossy(directives)
    }

    pub(crate) fn into_layer<S>(self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
    {
        let timer = tracing_subscriber::fmt::time::UtcTime::rfc_3339();
        match self.format {
            LogFormat::Plain => tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_target(true)
                .boxed(),
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_timer(timer)
                .with_file(true)
                .with_line_number(true)
                .flatten_event(true)
                .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsing_log_format() {
        assert_eq!("plain".parse::<LogFormat>().unwrap(), LogFormat::Plain);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        let err = "JSON".parse::<LogFormat>().unwrap_err();
        assert!(err.to_string().contains("`JSON`"), "{err}");
    }

    #[test]
    fn creating_logs() {
        let logs = Logs::default();
        assert_eq!(logs.format(), LogFormat::Plain);

        let logs = Logs::new("json")
            .unwrap()
            .with_log_directives(Some("warn".to_owned()));
        assert_eq!(logs.format(), LogFormat::Json);
        assert_eq!(logs.log_directives.as_deref(), Some("warn"));

        Logs::new("yaml").unwrap_err();
    }
}
