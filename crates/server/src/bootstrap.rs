use std::sync::Arc;

use permitdesk_agent::runtime::AgentRuntime;
use permitdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use permitdesk_core::ApplicationError;
use permitdesk_mcp::{McpCatalog, McpError};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("record api client setup failed: {0}")]
    RecordApi(#[source] McpError),
    #[error("agent runtime setup failed: {0}")]
    Runtime(#[from] ApplicationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the runtime without touching the network; the catalog handshake
/// happens on first use or on `AgentRuntime::warm_up`.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        record_api_url = %config.record_api.url,
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        "starting application bootstrap"
    );

    let catalog = McpCatalog::from_config(&config.record_api).map_err(BootstrapError::RecordApi)?;
    let runtime = AgentRuntime::from_config(&config.llm, &config.agent, Arc::new(catalog))?;

    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        max_tool_rounds = config.agent.max_tool_rounds,
        enrichment_record_limit = config.agent.enrichment_record_limit,
        "agent runtime assembled"
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}
