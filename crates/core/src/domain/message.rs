use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::DomainError;

/// A single tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self { id: id.into(), name: name.into(), args }
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    AssistantText {
        #[serde(default = "new_message_id")]
        id: String,
        content: String,
    },
    AssistantToolRequest {
        #[serde(default = "new_message_id")]
        id: String,
        calls: Vec<ToolCall>,
    },
    ToolResult {
        tool_call_id: String,
        name: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::AssistantText { id: new_message_id(), content: content.into() }
    }

    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Self::AssistantToolRequest { id: new_message_id(), calls }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn tool_error(call: &ToolCall, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            is_error: true,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::AssistantText { id, .. } | Self::AssistantToolRequest { id, .. } => Some(id),
            Self::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            Self::System { .. } | Self::User { .. } => None,
        }
    }
}

/// Ordered chat history for one conversation plus the UI flag the controller
/// sets once a rich payload has been emitted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub ui_handled: bool,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, ui_handled: false }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(|message| matches!(message, Message::System { .. }))
    }

    pub fn ends_with_assistant_text(&self) -> bool {
        matches!(self.last(), Some(Message::AssistantText { .. }))
    }

    /// Finds the call a tool result answers.
    pub fn tool_call(&self, call_id: &str) -> Option<&ToolCall> {
        self.messages.iter().rev().find_map(|message| match message {
            Message::AssistantToolRequest { calls, .. } => calls.iter().find(|call| call.id == call_id),
            _ => None,
        })
    }

    /// Every tool result must answer exactly one earlier tool call.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut answered = std::collections::HashSet::new();
        for (index, message) in self.messages.iter().enumerate() {
            let Message::ToolResult { tool_call_id, .. } = message else {
                continue;
            };
            let requested = self.messages[..index].iter().any(|earlier| match earlier {
                Message::AssistantToolRequest { calls, .. } => calls.iter().any(|call| &call.id == tool_call_id),
                _ => false,
            });
            if !requested {
                return Err(DomainError::InvalidHistory(format!(
                    "tool result `{tool_call_id}` does not answer an earlier tool call"
                )));
            }
            if !answered.insert(tool_call_id.clone()) {
                return Err(DomainError::InvalidHistory(format!(
                    "tool call `{tool_call_id}` was answered more than once"
                )));
            }
        }
        Ok(())
    }
}
