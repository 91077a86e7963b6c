// File: monitor/src/scheduler/jobs.rs
use crate::config::Config;
use crate::constants::cleanup;
use crate::health::HealthMonitor;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument};

/// Extended-report and history-retention jobs
pub struct MonitorScheduler {
    monitor: Arc<HealthMonitor>,
    config: Arc<Config>,
    scheduler: JobScheduler,
}

impl MonitorScheduler {
    pub async fn new(monitor: Arc<HealthMonitor>, config: Arc<Config>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            monitor,
            config,
            scheduler,
        })
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        self.schedule_extended_reports().await?;
        self.schedule_history_cleanup().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start scheduler: {}", e))?;
        info!(
            "Scheduler started: extended reports every {}s, history retention {} day(s)",
            self.config.extended_report_interval_seconds, self.config.history_retention_days
        );
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop scheduler: {}", e))
    }

    async fn schedule_extended_reports(&self) -> Result<()> {
        let period = Duration::from_secs(self.config.extended_report_interval_seconds);
        let monitor = self.monitor.clone();

        let job = Job::new_repeated_async(period, move |_uuid, _scheduler| {
            let monitor = monitor.clone();
            Box::pin(async move {
                info!("Executing scheduled extended reports");
                monitor.send_extended_reports().await;
            })
        })
        .map_err(|e| anyhow!("Failed to create extended report job: {}", e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add extended report job to scheduler: {}", e))?;
        Ok(())
    }

    async fn schedule_history_cleanup(&self) -> Result<()> {
        let monitor = self.monitor.clone();

        let job = Job::new_async(cleanup::HISTORY_CLEANUP_SCHEDULE, move |_uuid, _scheduler| {
            let monitor = monitor.clone();
            Box::pin(async move {
                match monitor.prune_history().await {
                    Ok(removed) => info!("History retention removed {} record(s)", removed),
                    Err(e) => error!("History retention failed: {}", e),
                }
            })
        })
        .map_err(|e| {
            anyhow!(
                "Failed to create history cleanup job for '{}': {}",
                cleanup::HISTORY_CLEANUP_SCHEDULE,
                e
            )
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add history cleanup job to scheduler: {}", e))?;
        Ok(())
    }
}
