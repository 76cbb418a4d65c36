use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use dms_exporter_config::{ExporterConfig, ObservabilityConfig};
use dms_exporter_metrics_server::MetricsServer;
use dms_exporter_periodic_job::PeriodicJob;
use dms_exporter_status_poller::{
    AwsStatusSource, CredentialResolver, GaugeStore, ResourceKind, StatusPoller, StatusSource,
};
use dms_exporter_vlog::{Logs, ObservabilityBuilder};
use futures::future;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use vise::MetricsCollection;

use crate::cli::Cli;

mod cli;

type Task = (&'static str, JoinHandle<anyhow::Result<()>>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let observability_config = cli.override_observability_config(
        ObservabilityConfig::from_env().context("failed loading observability config")?,
    );
    let logs = Logs::new(&observability_config.log_format)?
        .with_log_directives(Some(observability_config.log_directives));
    ObservabilityBuilder::new()
        .with_logs(Some(logs))
        .try_build()?;

    let config = cli.override_exporter_config(ExporterConfig::from_env()?);
    config.validate()?;
    tracing::info!(?config, "Starting DMS exporter");

    let (stop_signal_sender, stop_signal_receiver) = oneshot::channel();
    let mut stop_signal_sender = Some(stop_signal_sender);
    ctrlc::set_handler(move || {
        if let Some(sender) = stop_signal_sender.take() {
            sender.send(()).ok();
        }
    })
    .context("Error setting Ctrl+C handler")?;

    let (stop_sender, stop_receiver) = watch::channel(false);

    let store = GaugeStore::new();
    let mut registry = MetricsCollection::lazy().collect();
    store.register(&mut registry);
    let server = MetricsServer::new(registry)
        .bind(&config.bind_addresses())
        .await?;

    let source: Arc<dyn StatusSource> = Arc::new(AwsStatusSource::new(
        CredentialResolver::from_config(&config),
    ));
    let mut tasks: Vec<Task> = vec![(
        "MetricsServer",
        tokio::spawn(server.run(stop_receiver.clone())),
    )];
    for kind in ResourceKind::ALL {
        let poller = StatusPoller::new(kind, source.clone(), store.clone(), config.poll_interval());
        let name = poller.service_name();
        tasks.push((name, tokio::spawn(poller.run(stop_receiver.clone()))));
    }

    let finished_task = tokio::select! {
        (result, index, _) = future::select_all(tasks.iter_mut().map(|(_, handle)| handle)) => {
            Some((index, result))
        }
        _ = stop_signal_receiver => {
            tracing::info!("Stop signal received, shutting down");
            None
        }
    };

    let result = match finished_task {
        Some((index, result)) => {
            let (name, _) = tasks.remove(index);
            task_outcome(name, result)
        }
        None => Ok(()),
    };

    stop_sender.send_replace(true);
    wait_for_tasks(tasks, config.graceful_shutdown_timeout()).await;
    result
}

/// Converts the outcome of a task that finished before the stop signal. Tasks are expected
/// to run until stopped, so even a successful completion is an error.
fn task_outcome(
    name: &str,
    result: Result<anyhow::Result<()>, tokio::task::JoinError>,
) -> anyhow::Result<()> {
    match result {
        Ok(Ok(())) => Err(anyhow::anyhow!("task {name} finished unexpectedly")),
        Ok(Err(err)) => Err(err.context(format!("task {name} failed"))),
        Err(err) => Err(anyhow::anyhow!("task {name} panicked: {err}")),
    }
}

async fn wait_for_tasks(tasks: Vec<Task>, timeout: Duration) {
    let joined = future::join_all(tasks.into_iter().map(|(name, handle)| async move {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!("Task {name} failed during shutdown: {err:#}"),
            Err(err) => tracing::warn!("Task {name} panicked during shutdown: {err}"),
        }
    }));
    if tokio::time::timeout(timeout, joined).await.is_err() {
        tracing::warn!("Tasks didn't finish in {timeout:?}; exiting anyway");
    } else {
        tracing::info!("All tasks finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_task_completion_is_an_error() {
        let err = task_outcome("MetricsServer", Ok(Ok(()))).unwrap_err();
        assert!(err.to_string().contains("finished unexpectedly"), "{err}");

        let err = task_outcome(
            "ReplicationTaskPoller",
            Ok(Err(anyhow::anyhow!("boom"))),
        )
        .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("ReplicationTaskPoller failed"), "{message}");
        assert!(message.contains("boom"), "{message}");
    }

    #[tokio::test]
    async fn panicked_task_is_an_error() {
        let handle = tokio::spawn(async {
            if true {
                panic!("oops");
            }
            anyhow::Ok(())
        });
        let err = task_outcome("MetricsServer", handle.await).unwrap_err();
        assert!(err.to_string().contains("panicked"), "{err}");
    }

    #[tokio::test]
    async fn waiting_for_tasks_is_bounded() {
        let stuck: JoinHandle<anyhow::Result<()>> = tokio::spawn(future::pending());
        let finished: JoinHandle<anyhow::Result<()>> = tokio::spawn(async { Ok(()) });
        tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_tasks(
                vec![("Stuck", stuck), ("Finished", finished)],
                Duration::from_millis(50),
            ),
        )
        .await
        .unwrap();
    }
}
