mod bootstrap;
mod chat;
mod health;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use permitdesk_agent::runtime::AgentRuntime;
use permitdesk_agent::tools::CatalogStatus;
use permitdesk_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use permitdesk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn router(runtime: Arc<AgentRuntime>) -> Router {
    health::router(Arc::clone(&runtime)).merge(chat::router(runtime))
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap so its events are recorded
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    match app.runtime.warm_up().await {
        CatalogStatus::Connected { tools } => tracing::info!(
            event_name = "system.server.catalog_ready",
            correlation_id = "bootstrap",
            tools,
            "record api tool catalog ready"
        ),
        CatalogStatus::Unavailable { error } => tracing::warn!(
            event_name = "system.server.catalog_unavailable",
            correlation_id = "bootstrap",
            error = %error,
            "record api tool catalog unavailable; answering without record tools until restart"
        ),
    }

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "permitdesk-server started"
    );

    axum::serve(listener, router(app.runtime)).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "permitdesk-server stopping"
    );
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
