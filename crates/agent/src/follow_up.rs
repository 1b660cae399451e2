use std::sync::Arc;

use permitdesk_core::domain::follow_up::{default_follow_up_actions, parse_follow_up_actions};
use permitdesk_core::{FollowUpAction, Message};
use tracing::{debug, warn};

use crate::llm::{LlmClient, ModelReply};

const CONTEXT_MESSAGES: usize = 6;
const CONTEXT_MESSAGE_CHARS: usize = 200;

/// Asks the model for suggested next prompts after a final answer. Any failure
/// yields the default set, so a turn never fails here.
pub struct FollowUpSuggester {
    llm: Arc<dyn LlmClient>,
}

impl FollowUpSuggester {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn suggest(&self, history: &[Message], correlation_id: &str) -> Vec<FollowUpAction> {
        let request = [Message::user(follow_up_prompt(history))];
        let reply = match self.llm.complete(&request, &[]).await {
            Ok(ModelReply::Text(text)) => text,
            Ok(ModelReply::ToolRequests(_)) => {
                warn!(
                    event_name = "agent.follow_up.fallback",
                    correlation_id = %correlation_id,
                    reason = "tool_requests",
                    "model asked for tools instead of suggesting follow-ups"
                );
                return default_follow_up_actions();
            }
            Err(error) => {
                warn!(
                    event_name = "agent.follow_up.fallback",
                    correlation_id = %correlation_id,
                    reason = "model_failed",
                    error = %format!("{error:#}"),
                    "follow-up generation failed"
                );
                return default_follow_up_actions();
            }
        };

        match parse_follow_up_actions(&reply) {
            Ok(actions) => {
                debug!(
                    event_name = "agent.follow_up.generated",
                    correlation_id = %correlation_id,
                    actions = actions.len(),
                    "follow-up actions generated"
                );
                actions
            }
            Err(error) => {
                warn!(
                    event_name = "agent.follow_up.fallback",
                    correlation_id = %correlation_id,
                    reason = "unparseable",
                    error = %error,
                    "follow-up reply unusable"
                );
                default_follow_up_actions()
            }
        }
    }
}

fn follow_up_prompt(history: &[Message]) -> String {
    let answer = match history.last() {
        Some(Message::AssistantText { content, .. }) => content.as_str(),
        _ => "",
    };
    let start = history.len().saturating_sub(CONTEXT_MESSAGES);
    let context = history[start..].iter().filter_map(context_line).collect::<Vec<_>>().join("\n\n");

    format!(
        "Based on the conversation context and your previous response, suggest 4-6 relevant follow-up actions \
the user might want to take next.

Previous response: {answer}

Recent conversation:
{context}

Respond with ONLY a JSON array in this exact format:
[
  {{
    \"label\": \"Short Action Label\",
    \"prompt\": \"Complete question or request the user would ask\",
    \"category\": \"permit|inspection|application|status|document|fee|compliance|general\"
  }}
]

Focus on practical next steps for permit and licensing work. Make each prompt specific and actionable.
Categories:
- permit: general permit questions and guidance
- inspection: scheduling, preparing for, or following up on inspections
- application: starting new applications or continuing existing ones
- status: checking status of permits, applications, or processes
- document: document requirements, submissions, or reviews
- fee: payment information, fee calculations, or billing questions
- compliance: code compliance, regulations, or requirements
- general: anything else"
    )
}

fn context_line(message: &Message) -> Option<String> {
    let (role, content) = match message {
        Message::User { content } => ("User", content),
        Message::AssistantText { content, .. } => ("Assistant", content),
        Message::ToolResult { name, content, .. } => (name.as_str(), content),
        Message::System { .. } | Message::AssistantToolRequest { .. } => return None,
    };
    let mut text = content.chars().take(CONTEXT_MESSAGE_CHARS).collect::<String>();
    if content.chars().count() > CONTEXT_MESSAGE_CHARS {
        text.push_str("...");
    }
    Some(format!("{role}: {text}"))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use permitdesk_core::domain::follow_up::default_follow_up_actions;
    use permitdesk_core::{FollowUpCategory, Message};

    use super::{follow_up_prompt, FollowUpSuggester};
    use crate::llm::{LlmClient, ModelReply};
    use crate::tools::ToolDescriptor;

    struct CannedModel {
        reply: Mutex<Option<Result<ModelReply>>>,
        seen_tools: Mutex<Option<usize>>,
    }

    impl CannedModel {
        fn new(reply: Result<ModelReply>) -> Arc<Self> {
            Arc::new(Self { reply: Mutex::new(Some(reply)), seen_tools: Mutex::new(None) })
        }
    }

    #[async_trait]
    impl LlmClient for CannedModel {
        async fn complete(&self, _messages: &[Message], tools: &[ToolDescriptor]) -> Result<ModelReply> {
            *self.seen_tools.lock().map_err(|_| anyhow!("poisoned"))? = Some(tools.len());
            self.reply.lock().map_err(|_| anyhow!("poisoned"))?.take().unwrap_or_else(|| Err(anyhow!("used twice")))
        }
    }

    fn history() -> Vec<Message> {
        vec![Message::user("show active permits"), Message::assistant_text("BLD-101 is active.")]
    }

    #[tokio::test]
    async fn model_suggestions_are_used_when_they_parse() {
        let model = CannedModel::new(Ok(ModelReply::Text(
            r#"[{"label":"Book Inspection","prompt":"Book the final inspection for BLD-101.","category":"inspection"}]"#
                .to_string(),
        )));

        let actions = FollowUpSuggester::new(Arc::clone(&model) as Arc<dyn LlmClient>).suggest(&history(), "c-1").await;

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].label, "Book Inspection");
        assert_eq!(actions[0].category, FollowUpCategory::Inspection);
        assert_eq!(*model.seen_tools.lock().expect("lock"), Some(0));
    }

    #[tokio::test]
    async fn unusable_replies_fall_back_to_defaults() {
        for reply in [
            Ok(ModelReply::Text("Sure! You could check the status next.".to_string())),
            Ok(ModelReply::ToolRequests(Vec::new())),
            Err(anyhow!("upstream returned 503")),
        ] {
            let suggester = FollowUpSuggester::new(CannedModel::new(reply));
            assert_eq!(suggester.suggest(&history(), "c-2").await, default_follow_up_actions());
        }
    }

    #[test]
    fn prompt_carries_answer_and_truncated_context() {
        let long = "x".repeat(250);
        let mut messages = history();
        messages.insert(1, Message::user(long));
        messages.push(Message::assistant_text("Anything else?"));

        let prompt = follow_up_prompt(&messages);

        assert!(prompt.contains("Previous response: Anything else?"));
        assert!(prompt.contains(&format!("User: {}...", "x".repeat(200))));
        assert!(prompt.contains("Assistant: BLD-101 is active."));
    }
}
