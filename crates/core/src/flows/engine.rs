use thiserror::Error;

use crate::flows::states::{FlowAction, FlowContext, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Model decides, tools run, and control always returns to the model.
#[derive(Clone, Debug, Default)]
pub struct ToolLoopFlow;

impl FlowDefinition for ToolLoopFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::AwaitingDecision
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_tool_loop(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }
}

impl Default for FlowEngine<ToolLoopFlow> {
    fn default() -> Self {
        Self::new(ToolLoopFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("tool round limit of {max_rounds} reached")]
    RoundLimitReached { max_rounds: usize },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_tool_loop(
    current: &FlowState,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{ExecuteToolCalls, ProjectRecordResults, SuggestFollowUps};
    use FlowEvent::{AnswerProduced, ToolCallsRequested, ToolsCompleted};
    use FlowState::{AwaitingDecision, Done, ExecutingTools};

    let (to, actions) = match (current, event) {
        // A reply with no tool requests is an answer, however it was encoded.
        (AwaitingDecision, ToolCallsRequested { count: 0 } | AnswerProduced) => {
            (Done, vec![SuggestFollowUps])
        }
        (AwaitingDecision, ToolCallsRequested { .. }) => {
            if context.max_rounds > 0 && context.completed_rounds >= context.max_rounds {
                return Err(FlowTransitionError::RoundLimitReached { max_rounds: context.max_rounds });
            }
            (ExecutingTools, vec![ExecuteToolCalls, ProjectRecordResults])
        }
        // Emitting UI never ends the turn; the model still writes the reply.
        (ExecutingTools, ToolsCompleted { .. }) => (AwaitingDecision, Vec::new()),
        _ => {
            return Err(FlowTransitionError::InvalidTransition { state: *current, event: event.clone() });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
