// File: monitor/src/main.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use monitor::constants::{defaults, http};
use monitor::notify::Notification;
use monitor::scheduler::{run_check_loop, MonitorScheduler};
use monitor::web::{start_web_server, AppState, MonitorMetrics};
use monitor::{AlertService, ConfigManager, Database, HealthMonitor, HttpProber, StateStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("monitor=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting Monad validator monitor v{}", env!("CARGO_PKG_VERSION"));

    // Configuration errors are fatal
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| defaults::CONFIG_DIR.to_string());
    let config_manager = ConfigManager::new(config_dir.clone())
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_dir))?;
    let config = config_manager.get_current_config();
    info!(
        "Configuration loaded: {} validators ({} enabled), {}s check interval",
        config.validators.len(),
        config.enabled_validators().count(),
        config.check_interval_seconds
    );

    // History is optional; the monitor keeps running without it
    let database = match Database::new(&config.database_path).await {
        Ok(database) => Some(Arc::new(database)),
        Err(e) => {
            error!("History database unavailable, continuing without it: {}", e);
            None
        }
    };

    let client = reqwest::Client::builder()
        .timeout(http::NOTIFY_TIMEOUT)
        .connect_timeout(http::CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let alert_service = Arc::new(AlertService::from_config(&config, client));
    if !alert_service.has_channels() {
        warn!("⚠️  No alert channels enabled - state changes will only be logged");
    }

    let prober = Arc::new(HttpProber::new(&config)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let health_monitor = Arc::new(
        HealthMonitor::new(
            config.clone(),
            prober,
            alert_service.clone(),
            StateStore::new(&config.state_dir),
            database.clone(),
            shutdown_rx.clone(),
        )
        .await,
    );

    let delivered = alert_service
        .broadcast_notice(&Notification::notice(
            "Monitor started",
            format!(
                "Watching {} validator(s), checks every {}s",
                config.enabled_validators().count(),
                config.check_interval_seconds
            ),
        ))
        .await;
    info!("Startup notice delivered to {} channel(s)", delivered);

    let check_loop = tokio::spawn(run_check_loop(
        health_monitor.clone(),
        config.check_interval(),
        shutdown_rx.clone(),
    ));

    let scheduler = MonitorScheduler::new(health_monitor.clone(), config.clone()).await?;
    scheduler.start().await?;

    let metrics = Arc::new(MonitorMetrics::new().context("Failed to register metrics")?);
    let state = AppState::new(config.clone(), health_monitor.clone(), database, metrics);
    let web_server = tokio::spawn(start_web_server(state, shutdown_rx.clone()));

    wait_for_signal().await;
    info!("Shutdown signal received, stopping");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.shutdown().await {
        warn!("Scheduler shutdown failed: {}", e);
    }
    if let Err(e) = check_loop.await {
        error!("Check loop task panicked: {}", e);
    }
    match web_server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Health server error: {}", e),
        Err(e) => error!("Health server task panicked: {}", e),
    }

    alert_service
        .broadcast_notice(&Notification::notice(
            "Monitor stopped",
            "Validator monitoring has been shut down".to_string(),
        ))
        .await;

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
