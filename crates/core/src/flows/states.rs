use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    AwaitingDecision,
    ExecutingTools,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    /// The model asked for one or more tool calls.
    ToolCallsRequested { count: usize },
    /// The model replied with plain text.
    AnswerProduced,
    /// Every pending tool call has a ToolResult; `ui_emitted` counts UI
    /// payloads produced in the round.
    ToolsCompleted { ui_emitted: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    /// ExecutingTools rounds finished so far in this turn.
    pub completed_rounds: usize,
    /// Zero disables the limit.
    pub max_rounds: usize,
}

/// Work the controller performs after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ExecuteToolCalls,
    ProjectRecordResults,
    /// Ask the model for suggested next prompts once the answer is final.
    SuggestFollowUps,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
