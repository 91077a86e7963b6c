//! Scheduling for the validator monitor
//!
//! - **Check loop**: `tokio::time::interval` ticker that runs one full check
//!   tick per period and stops when shutdown is signalled
//! - **Extended reports**: repeated job every `extended_report_interval_seconds`
//! - **History retention**: hourly cron job (6-field format, sec min hour day month dow)

pub mod jobs;
pub use jobs::MonitorScheduler;

use crate::health::HealthMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Drive check ticks until shutdown; a tick in progress finishes before the loop exits
pub async fn run_check_loop(
    monitor: Arc<HealthMonitor>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick_count = 0u64;

    info!("Check loop started with {}s interval", period.as_secs());

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        if *shutdown.borrow() {
            break;
        }

        tick_count += 1;
        let summary = monitor.check_all_validators().await;

        if summary.failed > 0 {
            warn!("Tick #{}: {} validator check(s) failed", tick_count, summary.failed);
        }
        if tick_count % 10 == 0 {
            info!(
                "Health monitoring cycle #{}: {}/{} healthy",
                tick_count, summary.healthy, summary.checked
            );
        }
    }

    info!("Check loop stopped after {} tick(s)", tick_count);
}
