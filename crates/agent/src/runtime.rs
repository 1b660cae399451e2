use std::sync::Arc;

use permitdesk_core::config::{AgentConfig, LlmConfig};
use permitdesk_core::{ApplicationError, ConversationState};

use crate::conversation::{ControllerSettings, ConversationController, TurnFailure, TurnOutcome};
use crate::llm::{ChatCompletionsClient, LlmClient};
use crate::pipeline::RecordProjectionPipeline;
use crate::resolver::RelationshipResolver;
use crate::tools::{CatalogStatus, ToolCatalog, ToolRegistry};

/// Process-wide entry point: owns the tool registry and the controller that
/// every turn runs through.
pub struct AgentRuntime {
    registry: Arc<ToolRegistry>,
    controller: ConversationController,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, registry: Arc<ToolRegistry>, config: &AgentConfig) -> Self {
        let resolver = RelationshipResolver::new(Arc::clone(&registry), config.enrichment_record_limit);
        let controller = ConversationController::new(
            llm,
            Arc::clone(&registry),
            RecordProjectionPipeline::new(resolver),
            ControllerSettings::from(config),
        );
        Self { registry, controller }
    }

    /// Wires the chat-completions client and the given catalog from config.
    pub fn from_config(
        llm: &LlmConfig,
        agent: &AgentConfig,
        catalog: Arc<dyn ToolCatalog>,
    ) -> Result<Self, ApplicationError> {
        let client = ChatCompletionsClient::from_config(llm)
            .map_err(|error| ApplicationError::Configuration(format!("{error:#}")))?;
        Ok(Self::new(Arc::new(client), Arc::new(ToolRegistry::new(catalog)), agent))
    }

    /// Performs the catalog handshake ahead of the first turn.
    pub async fn warm_up(&self) -> CatalogStatus {
        let tools = self.registry.get_tools().await;
        self.registry.status().unwrap_or(CatalogStatus::Connected { tools: tools.len() })
    }

    pub fn catalog_status(&self) -> Option<CatalogStatus> {
        self.registry.status()
    }

    pub async fn handle_turn(
        &self,
        state: ConversationState,
        community: Option<&str>,
    ) -> Result<TurnOutcome, TurnFailure> {
        self.controller.run_turn(state, community).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use permitdesk_core::config::AppConfig;
    use permitdesk_core::domain::follow_up::default_follow_up_actions;
    use permitdesk_core::{ApplicationError, ConversationState, Message};

    use super::AgentRuntime;
    use crate::llm::{LlmClient, ModelReply};
    use crate::tools::{CatalogStatus, ToolCatalog, ToolDescriptor, ToolRegistry, ToolSet};

    struct EchoModel;

    #[async_trait]
    impl LlmClient for EchoModel {
        async fn complete(&self, messages: &[Message], _tools: &[ToolDescriptor]) -> Result<ModelReply> {
            let last = messages.iter().rev().find_map(|message| match message {
                Message::User { content } => Some(content.clone()),
                _ => None,
            });
            Ok(ModelReply::Text(format!("echo: {}", last.unwrap_or_default())))
        }
    }

    struct OfflineCatalog;

    #[async_trait]
    impl ToolCatalog for OfflineCatalog {
        async fn connect(&self) -> Result<ToolSet> {
            Err(anyhow!("dns lookup failed"))
        }
    }

    #[tokio::test]
    async fn offline_catalog_still_answers_in_text() {
        let registry = Arc::new(ToolRegistry::new(Arc::new(OfflineCatalog)));
        let runtime = AgentRuntime::new(Arc::new(EchoModel), registry, &AppConfig::default().agent);

        assert_eq!(runtime.catalog_status(), None);
        assert!(matches!(runtime.warm_up().await, CatalogStatus::Unavailable { .. }));

        let outcome = runtime
            .handle_turn(ConversationState::new(vec![Message::user("any permits?")]), None)
            .await
            .expect("turn should finish");
        assert!(matches!(
            outcome.state.last(),
            Some(Message::AssistantText { content, .. }) if content == "echo: any permits?"
        ));
        assert_eq!(outcome.follow_up_actions, default_follow_up_actions());
    }

    #[test]
    fn unusable_llm_endpoint_is_a_configuration_error() {
        let config = AppConfig::default();
        let mut llm = config.llm.clone();
        llm.base_url = Some("not a url".to_string());

        let result = AgentRuntime::from_config(&llm, &config.agent, Arc::new(OfflineCatalog));

        assert!(matches!(
            result,
            Err(ApplicationError::Configuration(ref message)) if message.contains("invalid llm endpoint")
        ));
    }
}
