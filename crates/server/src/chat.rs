use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use permitdesk_agent::runtime::AgentRuntime;
use permitdesk_core::{ApplicationError, ConversationState, FollowUpAction, InterfaceError, Message, UiMessage};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub ui_handled: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatResponse {
    pub messages: Vec<Message>,
    pub ui: Vec<UiMessage>,
    pub ui_handled: bool,
    pub follow_up_actions: Vec<FollowUpAction>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatErrorResponse {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ui: Vec<UiMessage>,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/v1/chat", post(chat)).with_state(ChatState { runtime })
}

pub async fn chat(State(state): State<ChatState>, Json(request): Json<ChatRequest>) -> Response {
    let conversation = ConversationState { messages: request.messages, ui_handled: request.ui_handled };

    if let Err(error) = conversation.validate() {
        let interface = ApplicationError::from(error).into_interface(Uuid::new_v4().to_string());
        warn!(
            event_name = "chat.request.rejected",
            correlation_id = %interface.correlation_id(),
            error = %interface,
            "chat history rejected"
        );
        return error_response(interface, Vec::new(), Vec::new());
    }

    match state.runtime.handle_turn(conversation, request.community.as_deref()).await {
        Ok(outcome) => {
            info!(
                event_name = "chat.turn.completed",
                correlation_id = %outcome.correlation_id,
                rounds = outcome.rounds,
                ui_payloads = outcome.ui.len(),
                follow_up_actions = outcome.follow_up_actions.len(),
                "chat turn completed"
            );
            let response = ChatResponse {
                messages: outcome.state.messages,
                ui: outcome.ui,
                ui_handled: outcome.state.ui_handled,
                follow_up_actions: outcome.follow_up_actions,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(failure) => {
            let interface = ApplicationError::from(failure.error).into_interface(failure.correlation_id);
            warn!(
                event_name = "chat.turn.failed",
                correlation_id = %interface.correlation_id(),
                error = %interface,
                "chat turn failed"
            );
            error_response(interface, failure.state.messages, failure.ui)
        }
    }
}

fn error_response(error: InterfaceError, messages: Vec<Message>, ui: Vec<UiMessage>) -> Response {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ChatErrorResponse {
        error: error.user_message(),
        detail: error.to_string(),
        correlation_id: error.correlation_id().to_string(),
        messages,
        ui,
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use permitdesk_agent::llm::{LlmClient, ModelReply};
    use permitdesk_agent::runtime::AgentRuntime;
    use permitdesk_agent::tools::{Tool, ToolDescriptor, ToolRegistry, ToolSet};
    use permitdesk_core::config::AppConfig;
    use permitdesk_core::{Message, ToolCall};
    use serde_json::{json, Map, Value};
    use tower::ServiceExt;

    use crate::chat::router;

    struct ScriptedModel(Mutex<VecDeque<Result<ModelReply>>>);

    #[async_trait]
    impl LlmClient for ScriptedModel {
        async fn complete(&self, _messages: &[Message], _tools: &[ToolDescriptor]) -> Result<ModelReply> {
            self.0
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("model unavailable")))
        }
    }

    struct RecordsTool(ToolDescriptor);

    #[async_trait]
    impl Tool for RecordsTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(json!({ "data": [{ "id": "5", "attributes": { "number": "ELC-5", "status": "Pending" } }] }))
        }
    }

    fn app(replies: Vec<Result<ModelReply>>) -> axum::Router {
        let mut tools = ToolSet::default();
        tools.register(RecordsTool(ToolDescriptor::new("get_record", "Fetch one record")));
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedModel(Mutex::new(replies.into()))),
            Arc::new(ToolRegistry::preloaded(tools)),
            &AppConfig::default().agent,
        );
        router(Arc::new(runtime))
    }

    async fn post(app: axum::Router, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/v1/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn chat_turn_returns_history_and_detail_payload() {
        let call = ToolCall::new("call_1", "get_record", Map::new());
        let app = app(vec![
            Ok(ModelReply::ToolRequests(vec![call])),
            Ok(ModelReply::Text("Record ELC-5 is pending review.".to_string())),
        ]);

        let (status, body) = post(
            app,
            json!({ "messages": [{ "role": "user", "content": "show record 5" }], "community": "springfield" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ui_handled"], json!(true));
        assert_eq!(body["ui"][0]["name"], json!("dynamic_record_detail"));
        assert_eq!(body["ui"][0]["payload"]["community"], json!("springfield"));
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.last().map(|message| &message["role"]), Some(&json!("assistant_text")));
        assert!(messages.iter().all(|message| message["role"] != json!("system")));

        // The script is exhausted, so the suggestion call fails and defaults are sent.
        let follow_ups = body["follow_up_actions"].as_array().expect("follow-up actions");
        assert_eq!(follow_ups.len(), 6);
        assert_eq!(follow_ups[0]["category"], json!("application"));
        assert_eq!(follow_ups[0]["label"], json!("Apply for Permit"));
    }

    #[tokio::test]
    async fn orphan_tool_result_is_rejected() {
        let (status, body) = post(
            app(Vec::new()),
            json!({ "messages": [
                { "role": "user", "content": "hi" },
                { "role": "tool_result", "tool_call_id": "c9", "name": "get_records", "content": "[]" }
            ] }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().is_some_and(|detail| detail.contains("c9")));
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn model_failure_returns_bad_gateway_with_history() {
        let (status, body) =
            post(app(Vec::new()), json!({ "messages": [{ "role": "user", "content": "any permits?" }] })).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], json!("The assistant is temporarily unavailable. Please retry shortly."));
        assert_eq!(body["messages"][0]["content"], json!("any permits?"));
    }
}
