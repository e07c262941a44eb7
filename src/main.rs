//!
//! Vitals telemetry hub server.
//! Reads configuration from TOML file (~/.config/vitals-hub/config.toml).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use vitals_hub::application::hub::HubOptions;
use vitals_hub::shared::shutdown::spawn_signal_listener;
use vitals_hub::{
    create_api_router, default_config_path, ApiState, AppConfig, Hub, SessionRegistry,
    ShutdownSignal, TelemetryServer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("VITALS_HUB_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            // Initialize logging with configured level
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            warn!("Failed to load config: {}. Using defaults.", e);
            AppConfig::default()
        }
    };

    info!("Starting Vitals Hub...");

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    // ── Hub instance ───────────────────────────────────────────
    let registry = SessionRegistry::shared();
    let hub = Hub::new(HubOptions::from(&app_cfg.hub), registry.clone());
    let hub_handle = hub.handle();
    info!(
        "Hub configured (grace period: {}s, history capacity: {})",
        app_cfg.hub.grace_period_secs, app_cfg.hub.history_capacity
    );

    // Initialize shutdown signal and listen for SIGTERM/SIGINT
    let shutdown = ShutdownSignal::new();
    spawn_signal_listener(shutdown.clone());

    let hub_task = tokio::spawn(hub.run(shutdown.clone()));

    // ── WebSocket server ───────────────────────────────────────
    let ws_server =
        TelemetryServer::new(&app_cfg.server, hub_handle.clone()).with_shutdown(shutdown.clone());
    let ws_task = tokio::spawn(async move { ws_server.run().await });

    // ── Status API server ──────────────────────────────────────
    let api_router = create_api_router(ApiState {
        hub: hub_handle,
        registry,
        started_at: Arc::new(Instant::now()),
        prometheus: prometheus_handle,
    });

    let api_addr = app_cfg.server.api_address();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("Status API listening on http://{}", api_addr);

    let api_shutdown = shutdown.clone();
    let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
        api_shutdown.wait().await;
        info!("🛑 Status API received shutdown signal");
    });
    let api_task = tokio::spawn(async move { api_server.await });

    info!("🚀 All servers started. Press Ctrl+C to shutdown gracefully.");

    // Wait for shutdown signal or server error
    tokio::select! {
        result = ws_task => {
            match result {
                Ok(Ok(())) => info!("WebSocket server stopped"),
                Ok(Err(e)) => error!("WebSocket server error: {}", e),
                Err(e) => error!("WebSocket server task panicked: {}", e),
            }
        }
        result = api_task => {
            match result {
                Ok(Ok(())) => info!("Status API server stopped"),
                Ok(Err(e)) => error!("Status API server error: {}", e),
                Err(e) => error!("Status API server task panicked: {}", e),
            }
        }
    }

    // Perform final cleanup: make sure the hub cancels timers and drops
    // every connection before the process exits.
    shutdown.trigger();
    match tokio::time::timeout(
        Duration::from_secs(app_cfg.server.shutdown_timeout_secs),
        hub_task,
    )
    .await
    {
        Ok(Ok(())) => info!("✅ Hub cleanup complete"),
        Ok(Err(e)) => warn!("Hub task panicked during shutdown: {}", e),
        Err(_) => warn!(
            "⚠️ Hub cleanup timed out after {}s",
            app_cfg.server.shutdown_timeout_secs
        ),
    }

    info!("👋 Vitals Hub shutdown complete");
    Ok(())
}
