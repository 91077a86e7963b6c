// File: monitor/src/web/server.rs
use crate::web::{handlers, AppState};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::path::Path;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub async fn start_web_server(state: AppState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let app = create_router(state.clone());
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind health server on {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!("Health server stopped");
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // === PROBES ===
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .route("/live", get(handlers::liveness))
        .route("/metrics", get(handlers::prometheus_metrics))
        // === DASHBOARD API ===
        .route("/api/status", get(handlers::get_status))
        .route("/api/validators", get(handlers::get_all_validators))
        .route("/api/validators/{name}", get(handlers::get_validator))
        .route(
            "/api/validators/{name}/history",
            get(handlers::get_validator_history),
        );

    let dashboard_dir = state.config.dashboard_dir.clone();
    if Path::new(&dashboard_dir).is_dir() {
        info!("Serving dashboard from {}", dashboard_dir);
        router = router.nest_service("/dashboard", ServeDir::new(dashboard_dir));
    } else {
        warn!("Dashboard directory {} not found, /dashboard disabled", dashboard_dir);
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
