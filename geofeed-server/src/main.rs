use anyhow::{Context, Result};
use geofeed::config::load_config;
use geofeed::{FeedManager, GeofeedConfig};
use geofeed_server::api::{create_router, AppState};
use geofeed_server::SourceFactory;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geofeed=info,geofeed_server=info".into()),
        )
        .init();

    info!("Geofeed server starting...");

    // Read configuration from environment
    let config = match std::env::var("GEOFEED_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            load_config(&path)?
        }
        Err(_) => {
            warn!("GEOFEED_CONFIG not set, using built-in feed defaults");
            GeofeedConfig::default()
        }
    };

    let api_port: u16 = std::env::var("GEOFEED_API_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("GEOFEED_API_PORT must be a valid port number")?;

    info!(
        api_port = api_port,
        decay_interval_ms = config.publisher.decay_interval_ms,
        "Configuration loaded"
    );

    // Start feed loops
    let manager = Arc::new(FeedManager::new(config, Arc::new(SourceFactory)));
    let summary = manager.start().await;
    for (feed, e) in &summary.failed {
        error!(feed = %feed, error = %e, "Feed not started");
    }

    // Start HTTP API server
    let router = create_router(AppState {
        manager: Arc::clone(&manager),
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", api_port))
        .await
        .context("Failed to bind geofeed API port")?;
    info!(port = api_port, "Geofeed API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "Geofeed API server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Graceful shutdown
    server_handle.abort();
    manager.shutdown().await;
    info!("Geofeed server stopped");

    Ok(())
}
