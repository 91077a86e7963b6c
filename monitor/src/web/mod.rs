// File: monitor/src/web/mod.rs
pub mod handlers;
pub mod metrics;
pub mod server;

pub use metrics::MonitorMetrics;
pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::config::Config;
use crate::database::Database;
use crate::health::HealthMonitor;

// Application state shared across all handlers; handlers only read the snapshot
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub health_monitor: Arc<HealthMonitor>,
    pub database: Option<Arc<Database>>,
    pub metrics: Arc<MonitorMetrics>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        health_monitor: Arc<HealthMonitor>,
        database: Option<Arc<Database>>,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        Self {
            config,
            health_monitor,
            database,
            metrics,
        }
    }
}
