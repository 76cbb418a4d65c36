//! HTTP server exposing the exporter metrics for scraping by Prometheus.

use std::{fmt, future::IntoFuture, net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::{net::TcpListener, sync::watch};
use vise::{Format, Registry};


/// Static landing page served at `/`.
pub const LANDING_PAGE: &str = "<html>
<head><title>AWS DMS Exporter</title></head>
<body>
<h1>AWS Database Migration Service Exporter</h1>
<p><a href='/metrics'>Metrics</a></p>
</body>
</html>
";

const METRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn metrics(State(registry): State<Arc<Registry>>) -> Response {
    let mut buffer = String::new();
    if let Err(err) = registry.encode(&mut buffer, Format::OpenMetricsForPrometheus) {
        tracing::error!("Failed encoding metrics: {err}");
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed encoding metrics").into_response();
    }
    ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], buffer).into_response()
}

/// Metrics server serving a fixed [`Registry`]. The registry is only read, so metrics are updated
/// by their owners (e.g., pollers) independently of scrapes.
#[derive(Clone)]
pub struct MetricsServer {
    registry: Arc<Registry>,
}

impl fmt::Debug for MetricsServer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("MetricsServer").finish_non_exhaustive()
    }
}

impl MetricsServer {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(landing_page))
            .route("/metrics", get(metrics))
            .with_state(self.registry.clone())
    }

    /// Binds the server to the first of `bind_addresses` (`host:port`) that can be bound. Failing to bind
    /// to any of them is fatal for the exporter.
    pub async fn bind(self, bind_addresses: &[String]) -> anyhow::Result<BoundMetricsServer> {
        let mut last_err = None;
        for bind_address in bind_addresses {
            match TcpListener::bind(bind_address.as_str()).await {
                Ok(listener) => {
                    let local_addr = listener
                        .local_addr()
                        .context("failed getting local address")?;
                    return Ok(BoundMetricsServer {
                        listener,
                        local_addr,
                        router: self.router(),
                    });
                }
                Err(err) => {
                    tracing::debug!("Cannot bind metrics server to {bind_address}: {err}");
                    last_err = Some(err);
                }
            }
        }

        let err = last_err.map_or_else(
            || anyhow::anyhow!("no bind addresses provided"),
            anyhow::Error::from,
        );
        Err(err.context(format!(
            "failed binding metrics server to {}",
            bind_addresses.join(" / ")
        )))
    }
}

/// [`MetricsServer`] bound to a TCP listener.
#[derive(Debug)]
pub struct BoundMetricsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
}

impl BoundMetricsServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until a stop signal is received.
    pub async fn run(self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()> {
        let local_addr = self.local_addr;
        tracing::info!(%local_addr, "Started metrics server");

        let graceful_shutdown = async move {
            if stop_receiver.changed().await.is_err() {
                tracing::warn!(
                    "Stop request sender for metrics server was dropped without sending a request"
                );
            }
            tracing::info!("Stop request received, metrics server is shutting down");
        };
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(graceful_shutdown)
            .into_future()
            .await
            .context("metrics server failed")?;

        tracing::info!("Metrics server shut down");
        Ok(())
    }
}
