use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use permitdesk_core::config::LlmConfig;
use permitdesk_core::{Message, ToolCall};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::tools::ToolDescriptor;

/// What the model decided for this step of the turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolRequests(Vec<ToolCall>),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<ModelReply>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint (OpenAI
/// itself, or Ollama's compatibility layer).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build llm http client")?;

        let endpoint = format!("{}/chat/completions", config.endpoint_base());
        reqwest::Url::parse(&endpoint).with_context(|| format!("invalid llm endpoint `{endpoint}`"))?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.bearer_token().map(|token| SecretString::from(token.to_string())),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<ModelReply> {
        let mut body = json!({
            "model": &self.model,
            "messages": encode_messages(messages),
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = encode_tools(tools);
        }

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("chat completion request failed")?;
        let status = response.status();
        let text = response.text().await.context("failed to read chat completion body")?;
        if !status.is_success() {
            return Err(anyhow!("chat completion returned {status}: {}", truncate(&text, 500)));
        }

        debug!(event_name = "llm.completion_received", model = %self.model, bytes = text.len(), "model replied");
        decode_reply(&text)
    }
}

pub fn encode_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::System { content } => json!({ "role": "system", "content": content }),
            Message::User { content } => json!({ "role": "user", "content": content }),
            Message::AssistantText { content, .. } => json!({ "role": "assistant", "content": content }),
            Message::AssistantToolRequest { calls, .. } => json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": calls
                    .iter()
                    .map(|call| json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": Value::Object(call.args.clone()).to_string(),
                        }
                    }))
                    .collect::<Vec<_>>(),
            }),
            Message::ToolResult { tool_call_id, content, .. } => {
                json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content })
            }
        })
        .collect()
}

pub fn encode_tools(tools: &[ToolDescriptor]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect(),
    )
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ReplyToolCall>>,
}

#[derive(Deserialize)]
struct ReplyToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ReplyFunction,
}

#[derive(Deserialize)]
struct ReplyFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

pub fn decode_reply(body: &str) -> Result<ModelReply> {
    let response: CompletionResponse =
        serde_json::from_str(body).context("failed to parse chat completion response")?;
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| anyhow!("chat completion returned no choices"))?;

    let tool_calls = message.tool_calls.unwrap_or_default();
    if tool_calls.is_empty() {
        return Ok(ModelReply::Text(message.content.unwrap_or_default()));
    }

    let calls = tool_calls
        .into_iter()
        .map(|call| {
            let args = decode_arguments(&call.function.name, call.function.arguments)?;
            let id = call.id.filter(|id| !id.is_empty()).unwrap_or_else(|| format!("call_{}", Uuid::new_v4()));
            Ok(ToolCall::new(id, call.function.name, args))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ModelReply::ToolRequests(calls))
}

fn decode_arguments(tool: &str, raw: Value) -> Result<Map<String, Value>> {
    match raw {
        Value::Object(args) => Ok(args),
        Value::Null => Ok(Map::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(args)) => Ok(args),
            Ok(_) => Err(anyhow!("arguments for `{tool}` are not a JSON object")),
            Err(error) => Err(anyhow!("arguments for `{tool}` are not valid JSON: {error}")),
        },
        _ => Err(anyhow!("arguments for `{tool}` are not a JSON object")),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
