//! Cron-based maintenance scheduler.
//!
//! Fires a [`MaintenanceJob`] on a six-field cron schedule. Join handles are
//! tracked, cancellation is explicit, and every asynchronous operation is
//! wrapped in a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use policyqa_infra::errors::InfraError;
//! use policyqa_infra::scheduling::{
//!     MaintenanceJob, MaintenanceScheduler, MaintenanceSchedulerConfig, SchedulerResult,
//! };
//!
//! struct NoopJob;
//!
//! #[async_trait]
//! impl MaintenanceJob for NoopJob {
//!     async fn run(&self) -> Result<(), InfraError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> SchedulerResult<()> {
//! let mut scheduler = MaintenanceScheduler::new(
//!     MaintenanceSchedulerConfig { cron_expression: "0 0 * * * *".into(), ..Default::default() },
//!     Arc::new(NoopJob),
//! )?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};
use super::maintenance_job::MaintenanceJob;

/// Configuration for the maintenance scheduler.
#[derive(Debug, Clone)]
pub struct MaintenanceSchedulerConfig {
    /// Cron expression describing the execution schedule (seconds first).
    pub cron_expression: String,
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for MaintenanceSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 0 * * * *".into(), // hourly
            // A rotation re-encrypts every stored row
            job_timeout: Duration::from_secs(1800),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Maintenance scheduler with explicit lifecycle management.
///
/// A fresh [`JobScheduler`] is built on every `start`, so a stopped
/// scheduler can be started again.
pub struct MaintenanceScheduler {
    config: MaintenanceSchedulerConfig,
    job: Arc<dyn MaintenanceJob>,
    scheduler: Option<JobScheduler>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl MaintenanceScheduler {
    /// Create a scheduler. The cron expression is validated up front.
    pub fn new(
        config: MaintenanceSchedulerConfig,
        job: Arc<dyn MaintenanceJob>,
    ) -> SchedulerResult<Self> {
        build_job(&config, Arc::clone(&job))?;

        Ok(Self {
            config,
            job,
            scheduler: None,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &MaintenanceSchedulerConfig {
        &self.config
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self), fields(cron = %self.config.cron_expression))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let start_timeout = self.config.start_timeout;
        let scheduler = tokio::time::timeout(start_timeout, JobScheduler::new())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: start_timeout })?
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let job = build_job(&self.config, Arc::clone(&self.job))?;
        let job_id = scheduler
            .add(job)
            .await
            .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        tokio::time::timeout(start_timeout, scheduler.start())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: start_timeout })?
            .map_err(|source| SchedulerError::StartFailed { source })?;

        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("maintenance_scheduler.monitor_cancelled");
        }));
        self.scheduler = Some(scheduler);

        info!(job_id = %job_id, "maintenance_scheduler.started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, scheduler.shutdown())
            .await
            .map_err(|_| SchedulerError::Timeout { duration: stop_timeout })?
            .map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: join_timeout })??;
        }

        info!("maintenance_scheduler.stopped");
        Ok(())
    }

    /// Returns true while started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
            && self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("maintenance_scheduler.dropped_while_running");
            self.cancellation.cancel();
        }
    }
}

fn build_job(config: &MaintenanceSchedulerConfig, job: Arc<dyn MaintenanceJob>) -> SchedulerResult<Job> {
    let job_timeout = config.job_timeout;

    Job::new_async(config.cron_expression.as_str(), move |_id, _lock| {
        let job = Arc::clone(&job);

        Box::pin(async move {
            let started = Instant::now();
            match tokio::time::timeout(job_timeout, job.run()).await {
                Ok(Ok(())) => {
                    debug!(duration_ms = started.elapsed().as_millis() as u64, "maintenance.job_finished");
                }
                Ok(Err(err)) => {
                    error!(error = ?err, duration_ms = started.elapsed().as_millis() as u64, "maintenance.job_failed");
                }
                Err(_) => {
                    warn!(timeout_secs = job_timeout.as_secs(), "maintenance.job_timed_out");
                }
            }
        })
    })
    .map_err(|source| SchedulerError::InvalidSchedule {
        expression: config.cron_expression.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::errors::InfraError;

    struct CountingJob {
        runs: AtomicUsize,
    }

    impl CountingJob {
        fn new() -> Self {
            Self { runs: AtomicUsize::new(0) }
        }

        fn run_count(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MaintenanceJob for CountingJob {
        async fn run(&self) -> Result<(), InfraError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_config() -> MaintenanceSchedulerConfig {
        MaintenanceSchedulerConfig {
            cron_expression: "*/1 * * * * *".into(), // every second
            job_timeout: Duration::from_secs(2),
            start_timeout: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_runs_job() {
        let job = Arc::new(CountingJob::new());
        let mut scheduler = MaintenanceScheduler::new(fast_config(), job.clone()).unwrap();

        scheduler.start().await.expect("start succeeds");
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop().await.expect("stop succeeds");

        assert!(job.run_count() >= 1);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected() {
        let mut scheduler =
            MaintenanceScheduler::new(fast_config(), Arc::new(CountingJob::new())).unwrap();

        scheduler.start().await.expect("first start");
        let err = scheduler.start().await.expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        scheduler.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_without_start_is_rejected() {
        let mut scheduler =
            MaintenanceScheduler::new(fast_config(), Arc::new(CountingJob::new())).unwrap();
        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_rejected_up_front() {
        let config = MaintenanceSchedulerConfig { cron_expression: "every hour".into(), ..fast_config() };
        let result = MaintenanceScheduler::new(config, Arc::new(CountingJob::new()));
        assert!(matches!(result, Err(SchedulerError::InvalidSchedule { .. })));
    }
}
