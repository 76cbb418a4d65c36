//! Jobs that run a routine task on a fixed interval until a stop signal is received.

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::sync::watch;

#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Name of the job used in logs.
    fn service_name(&self) -> &'static str;

    /// Runs the routine task once. An error returned from here terminates the job, so recoverable errors
    /// should be handled by the implementation.
    async fn run_routine_task(&mut self) -> anyhow::Result<()>;

    /// Delay between the end of one routine task and the start of the next one.
    fn polling_interval(&self) -> Duration;

    async fn run(mut self, mut stop_receiver: watch::Receiver<bool>) -> anyhow::Result<()>
    where
        Self: Sized,
    {
        let service_name = self.service_name();
        let interval = self.polling_interval();
        tracing::info!(
            "Starting periodic job: {service_name} with frequency: {interval:?}"
        );

        while !*stop_receiver.borrow() {
            self.run_routine_task()
                .await
                .with_context(|| format!("{service_name}: run_routine_task()"))?;

            match tokio::time::timeout(interval, stop_receiver.changed()).await {
                Ok(Ok(())) | Err(_) => {}
                Ok(Err(_)) => {
                    // The stop sender is gone; nothing can interrupt the sleep anymore.
                    tokio::time::sleep(interval).await;
                }
            }
        }

        tracing::info!("Stop signal received, {service_name} is shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Debug)]
    struct CountingJob {
        runs: Arc<AtomicUsize>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl PeriodicJob for CountingJob {
        fn service_name(&self) -> &'static str {
            "CountingJob"
        }

        async fn run_routine_task(&mut self) -> anyhow::Result<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(run) {
                anyhow::bail!("run #{run} failed");
            }
            Ok(())
        }

        fn polling_interval(&self) -> Duration {
            Duration::from_secs(45)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_runs_on_interval_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = CountingJob {
            runs: runs.clone(),
            fail_on: None,
        };
        let (stop_sender, stop_receiver) = watch::channel(false);
        let handle = tokio::spawn(job.run(stop_receiver));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);

        stop_sender.send_replace(true);
        handle.await.unwrap().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn job_keeps_running_without_stop_sender() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = CountingJob {
            runs: runs.clone(),
            fail_on: None,
        };
        let (stop_sender, stop_receiver) = watch::channel(false);
        drop(stop_sender);
        let handle = tokio::spawn(job.run(stop_receiver));

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn routine_task_error_terminates_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let job = CountingJob {
            runs: runs.clone(),
            fail_on: Some(2),
        };
        let (_stop_sender, stop_receiver) = watch::channel(false);

        let err = job.run(stop_receiver).await.unwrap_err();
        assert!(format!("{err:#}").contains("run #2 failed"), "{err:#}");
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
