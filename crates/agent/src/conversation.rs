use std::iter;
use std::sync::Arc;

use futures::future::join_all;
use permitdesk_core::config::AgentConfig;
use permitdesk_core::flows::{
    FlowAction, FlowContext, FlowEngine, FlowEvent, FlowState, FlowTransitionError, ToolLoopFlow,
};
use permitdesk_core::{ApplicationError, ConversationState, FollowUpAction, Message, ToolCall, UiMessage};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::follow_up::FollowUpSuggester;
use crate::llm::{LlmClient, ModelReply};
use crate::pipeline::{is_record_query, RecordProjectionPipeline};
use crate::tools::{tool_output_text, ToolRegistry, ToolSet};

pub const UNKNOWN_COMMUNITY: &str = "Unknown";

#[derive(Clone, Debug)]
pub struct ControllerSettings {
    pub system_prompt: String,
    pub max_tool_rounds: usize,
    pub default_community: Option<String>,
    pub follow_up_actions: bool,
}

impl From<&AgentConfig> for ControllerSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            system_prompt: config.system_prompt.clone(),
            max_tool_rounds: config.max_tool_rounds,
            default_community: config.default_community.clone(),
            follow_up_actions: config.follow_up_actions,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub ui: Vec<UiMessage>,
    /// Suggested next prompts; empty when suggestions are switched off.
    pub follow_up_actions: Vec<FollowUpAction>,
    pub rounds: usize,
    pub correlation_id: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("model call failed: {0}")]
    Model(String),
    #[error("stopped after {max_rounds} tool rounds without a final answer")]
    ToolRoundLimit { max_rounds: usize },
    #[error(transparent)]
    Flow(FlowTransitionError),
}

impl From<FlowTransitionError> for TurnError {
    fn from(error: FlowTransitionError) -> Self {
        match error {
            FlowTransitionError::RoundLimitReached { max_rounds } => Self::ToolRoundLimit { max_rounds },
            other => Self::Flow(other),
        }
    }
}

impl From<TurnError> for ApplicationError {
    fn from(error: TurnError) -> Self {
        match error {
            TurnError::Model(message) => Self::Model(message),
            TurnError::ToolRoundLimit { .. } => Self::Model(error.to_string()),
            TurnError::Flow(flow) => Self::Domain(flow.into()),
        }
    }
}

/// A turn that could not finish. Everything appended before the failure is
/// kept in `state`.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{error}")]
pub struct TurnFailure {
    pub state: ConversationState,
    pub ui: Vec<UiMessage>,
    pub error: TurnError,
    pub correlation_id: String,
}

/// Drives one user turn: model decides, tools run, results are projected, and
/// control returns to the model until it answers in text.
pub struct ConversationController {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    pipeline: RecordProjectionPipeline,
    follow_ups: FollowUpSuggester,
    flow: FlowEngine<ToolLoopFlow>,
    settings: ControllerSettings,
}

impl ConversationController {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        pipeline: RecordProjectionPipeline,
        settings: ControllerSettings,
    ) -> Self {
        let follow_ups = FollowUpSuggester::new(Arc::clone(&llm));
        Self { llm, registry, pipeline, follow_ups, flow: FlowEngine::default(), settings }
    }

    pub async fn run_turn(
        &self,
        mut state: ConversationState,
        community: Option<&str>,
    ) -> Result<TurnOutcome, TurnFailure> {
        let correlation_id = Uuid::new_v4().to_string();
        let tools = self.registry.get_tools().await;
        let descriptors = tools.descriptors();

        let mut phase = self.flow.initial_state();
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut planned: Vec<FlowAction> = Vec::new();
        let mut ui = Vec::new();
        let mut rounds = 0;

        info!(
            event_name = "agent.turn.start",
            correlation_id = %correlation_id,
            messages = state.messages.len(),
            tools = descriptors.len(),
            "conversation turn started"
        );

        loop {
            let context = FlowContext { completed_rounds: rounds, max_rounds: self.settings.max_tool_rounds };
            match phase {
                FlowState::AwaitingDecision => {
                    let request = self.model_messages(&state);
                    let reply = match self.llm.complete(&request, &descriptors).await {
                        Ok(reply) => reply,
                        Err(error) => {
                            warn!(
                                event_name = "agent.turn.model_failed",
                                correlation_id = %correlation_id,
                                error = %format!("{error:#}"),
                                "model call failed"
                            );
                            return Err(TurnFailure {
                                state,
                                ui,
                                error: TurnError::Model(format!("{error:#}")),
                                correlation_id,
                            });
                        }
                    };

                    let (event, text, calls) = match reply {
                        ModelReply::Text(text) => (FlowEvent::AnswerProduced, text, Vec::new()),
                        ModelReply::ToolRequests(calls) => {
                            (FlowEvent::ToolCallsRequested { count: calls.len() }, String::new(), calls)
                        }
                    };

                    let outcome = match self.flow.apply(&phase, &event, &context) {
                        Ok(outcome) => outcome,
                        Err(error) => {
                            warn!(
                                event_name = "agent.turn.stopped",
                                correlation_id = %correlation_id,
                                error = %error,
                                "turn stopped before completion"
                            );
                            return Err(TurnFailure { state, ui, error: error.into(), correlation_id });
                        }
                    };
                    if outcome.actions.contains(&FlowAction::ExecuteToolCalls) {
                        state.push(Message::tool_request(calls.clone()));
                        pending = calls;
                    } else {
                        state.push(Message::assistant_text(text));
                    }
                    planned = outcome.actions;
                    phase = outcome.to;
                }
                FlowState::ExecutingTools => {
                    let round = Round {
                        calls: &pending,
                        project: planned.contains(&FlowAction::ProjectRecordResults),
                        community,
                        correlation_id: &correlation_id,
                    };
                    let emitted = self.execute_round(&mut state, round, &tools, &mut ui).await;
                    rounds += 1;
                    if emitted > 0 {
                        state.ui_handled = true;
                    }

                    let outcome = self
                        .flow
                        .apply(&phase, &FlowEvent::ToolsCompleted { ui_emitted: emitted }, &context)
                        .map_err(|error| TurnFailure {
                            state: state.clone(),
                            ui: ui.clone(),
                            error: error.into(),
                            correlation_id: correlation_id.clone(),
                        })?;
                    pending.clear();
                    planned = outcome.actions;
                    phase = outcome.to;
                }
                FlowState::Done => {
                    let follow_up_actions =
                        if self.settings.follow_up_actions && planned.contains(&FlowAction::SuggestFollowUps) {
                            self.follow_ups.suggest(&state.messages, &correlation_id).await
                        } else {
                            Vec::new()
                        };
                    info!(
                        event_name = "agent.turn.done",
                        correlation_id = %correlation_id,
                        rounds,
                        ui_payloads = ui.len(),
                        follow_up_actions = follow_up_actions.len(),
                        "conversation turn finished"
                    );
                    return Ok(TurnOutcome { state, ui, follow_up_actions, rounds, correlation_id });
                }
            }
        }
    }

    /// History sent to the model; the system instruction is prepended when the
    /// caller's history has none, and is not stored.
    fn model_messages(&self, state: &ConversationState) -> Vec<Message> {
        if state.has_system_message() {
            return state.messages.clone();
        }
        iter::once(Message::system(self.settings.system_prompt.clone())).chain(state.messages.iter().cloned()).collect()
    }

    fn community_for(&self, call: &ToolCall, requested: Option<&str>) -> String {
        call.arg_str("community")
            .or(requested.map(str::trim).filter(|value| !value.is_empty()))
            .or(self.settings.default_community.as_deref())
            .unwrap_or(UNKNOWN_COMMUNITY)
            .to_string()
    }

    /// Runs every pending call, appends one ToolResult per call in request
    /// order, then appends a summary and UI payload for each record query.
    /// Returns the number of UI payloads emitted.
    async fn execute_round(
        &self,
        state: &mut ConversationState,
        round: Round<'_>,
        tools: &ToolSet,
        ui: &mut Vec<UiMessage>,
    ) -> usize {
        let results = join_all(round.calls.iter().map(|call| invoke(tools, call))).await;

        let mut projections = Vec::new();
        for (call, result) in round.calls.iter().zip(results) {
            match result {
                Ok(output) => {
                    state.push(Message::tool_result(call, tool_output_text(&output)));
                    if round.project && is_record_query(&call.name) {
                        projections.push((call, output));
                    }
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.tool.failed",
                        correlation_id = %round.correlation_id,
                        tool = %call.name,
                        error = %error,
                        "tool call failed"
                    );
                    state.push(Message::tool_error(call, error.tool_result_text()));
                }
            }
        }

        let mut emitted = 0;
        for (call, output) in projections {
            let community = self.community_for(call, round.community);
            match self.pipeline.project(&call.name, &output, &community).await {
                Ok(projection) => {
                    let summary = Message::assistant_text(projection.summary);
                    let message_id = summary.id().unwrap_or_default().to_string();
                    state.push(summary);
                    ui.push(UiMessage::new(message_id, projection.payload));
                    emitted += 1;
                }
                Err(error) => {
                    let error =
                        ApplicationError::MalformedResponse { tool: call.name.clone(), message: error.to_string() };
                    debug!(
                        event_name = "agent.projection.skipped",
                        correlation_id = %round.correlation_id,
                        error = %error,
                        "no structured payload for tool result"
                    );
                }
            }
        }
        emitted
    }
}

struct Round<'a> {
    calls: &'a [ToolCall],
    /// Record-query results get a summary and UI payload.
    project: bool,
    community: Option<&'a str>,
    correlation_id: &'a str,
}

async fn invoke(tools: &ToolSet, call: &ToolCall) -> Result<Value, ApplicationError> {
    let tool = tools.get(&call.name).ok_or_else(|| ApplicationError::ToolNotFound(call.name.clone()))?;
    tool.execute(Value::Object(call.args.clone()))
        .await
        .map_err(|error| ApplicationError::ToolExecution { tool: call.name.clone(), message: format!("{error:#}") })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use permitdesk_core::{ConversationState, FollowUpCategory, Message, ToolCall};
    use serde_json::{json, Map, Value};

    use super::{ControllerSettings, ConversationController, TurnError};
    use crate::llm::{LlmClient, ModelReply};
    use crate::pipeline::RecordProjectionPipeline;
    use crate::resolver::RelationshipResolver;
    use crate::tools::{Tool, ToolDescriptor, ToolRegistry, ToolSet};

    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ModelReply>>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<ModelReply>>) -> Self {
            Self { replies: Mutex::new(replies.into()), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedModel {
        async fn complete(&self, messages: &[Message], _tools: &[ToolDescriptor]) -> Result<ModelReply> {
            self.seen.lock().map_err(|_| anyhow!("poisoned"))?.push(messages.to_vec());
            self.replies
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .pop_front()
                .unwrap_or_else(|| Ok(ModelReply::Text("done".to_string())))
        }
    }

    struct StaticTool(ToolDescriptor, Value);

    #[async_trait]
    impl Tool for StaticTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.0
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(self.1.clone())
        }
    }

    fn controller(model: Arc<ScriptedModel>, max_tool_rounds: usize) -> ConversationController {
        controller_with(model, max_tool_rounds, false)
    }

    fn controller_with(
        model: Arc<ScriptedModel>,
        max_tool_rounds: usize,
        follow_up_actions: bool,
    ) -> ConversationController {
        let mut tools = ToolSet::default();
        tools.register(StaticTool(
            ToolDescriptor::new("get_records", "List records"),
            json!({ "data": [{ "id": "1", "attributes": { "number": "A-1" } }] }),
        ));
        let registry = Arc::new(ToolRegistry::preloaded(tools));
        let pipeline = RecordProjectionPipeline::new(RelationshipResolver::new(Arc::clone(&registry), 5));
        ConversationController::new(
            model,
            registry,
            pipeline,
            ControllerSettings {
                system_prompt: "be helpful".to_string(),
                max_tool_rounds,
                default_community: None,
                follow_up_actions,
            },
        )
    }

    fn call(id: &str, name: &str) -> ToolCall {
        let mut args = Map::new();
        args.insert("community".to_string(), json!("springfield"));
        ToolCall::new(id, name, args)
    }

    #[tokio::test]
    async fn system_prompt_is_sent_but_not_stored() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelReply::Text("hello".to_string()))]));
        let outcome = controller(Arc::clone(&model), 8)
            .run_turn(ConversationState::new(vec![Message::user("hi")]), None)
            .await
            .expect("turn");

        let seen = model.seen.lock().expect("lock");
        assert!(matches!(seen[0][0], Message::System { ref content } if content == "be helpful"));
        assert_eq!(outcome.state.messages.len(), 2);
        assert!(!outcome.state.has_system_message());
        assert!(outcome.state.ends_with_assistant_text());
    }

    #[tokio::test]
    async fn unknown_tool_becomes_tool_result_and_loop_continues() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::ToolRequests(vec![call("c1", "get_weather")])),
            Ok(ModelReply::Text("Sorry, I cannot check the weather.".to_string())),
        ]));
        let outcome = controller(model, 8)
            .run_turn(ConversationState::new(vec![Message::user("weather?")]), None)
            .await
            .expect("turn");

        assert!(outcome.state.messages.iter().any(|message| matches!(
            message,
            Message::ToolResult { is_error: true, content, .. } if content.contains("get_weather")
        )));
        assert!(outcome.ui.is_empty());
        assert!(!outcome.state.ui_handled);
        assert!(outcome.state.ends_with_assistant_text());
    }

    #[tokio::test]
    async fn round_limit_stops_turn_with_history_intact() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::ToolRequests(vec![call("c1", "get_records")])),
            Ok(ModelReply::ToolRequests(vec![call("c2", "get_records")])),
        ]));
        let failure = controller(model, 1)
            .run_turn(ConversationState::new(vec![Message::user("loop")]), None)
            .await
            .expect_err("limit");

        assert_eq!(failure.error, TurnError::ToolRoundLimit { max_rounds: 1 });
        assert_eq!(failure.ui.len(), 1);
        assert!(failure.state.validate().is_ok());
        assert!(failure.state.tool_call("c2").is_none());
    }

    #[tokio::test]
    async fn community_falls_back_to_unknown() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::ToolRequests(vec![ToolCall::new("c1", "get_records", Map::new())])),
            Ok(ModelReply::Text("Found one.".to_string())),
        ]));
        let outcome = controller(model, 8)
            .run_turn(ConversationState::new(vec![Message::user("records")]), None)
            .await
            .expect("turn");

        assert!(outcome.state.messages.iter().any(|message| matches!(
            message,
            Message::AssistantText { content, .. } if content.contains("for Unknown")
        )));
    }

    #[tokio::test]
    async fn empty_tool_request_list_is_a_final_answer() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelReply::ToolRequests(Vec::new()))]));
        let outcome = controller(Arc::clone(&model), 8)
            .run_turn(ConversationState::new(vec![Message::user("thanks")]), None)
            .await
            .expect("empty request list ends the turn");

        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.state.messages.len(), 2);
        assert!(outcome.state.ends_with_assistant_text());
        assert!(outcome.state.validate().is_ok());
        assert_eq!(model.seen.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn final_answer_carries_follow_up_actions_without_storing_them() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelReply::Text("BLD-101 is active.".to_string())),
            Ok(ModelReply::Text(
                r#"[{"label":"Check Fees","prompt":"What fees are due on BLD-101?","category":"fee"}]"#.to_string(),
            )),
        ]));
        let outcome = controller_with(Arc::clone(&model), 8, true)
            .run_turn(ConversationState::new(vec![Message::user("is BLD-101 active?")]), None)
            .await
            .expect("turn");

        assert_eq!(outcome.follow_up_actions.len(), 1);
        assert_eq!(outcome.follow_up_actions[0].category, FollowUpCategory::Fee);
        assert_eq!(outcome.state.messages.len(), 2);
        assert!(outcome.state.ends_with_assistant_text());

        let seen = model.seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            seen[1].as_slice(),
            [Message::User { content }] if content.contains("Previous response: BLD-101 is active.")
        ));
    }

    #[tokio::test]
    async fn follow_ups_are_skipped_when_switched_off() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelReply::Text("hello".to_string()))]));
        let outcome = controller(Arc::clone(&model), 8)
            .run_turn(ConversationState::new(vec![Message::user("hi")]), None)
            .await
            .expect("turn");

        assert!(outcome.follow_up_actions.is_empty());
        assert_eq!(model.seen.lock().expect("lock").len(), 1);
    }
}
