pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod projection;

pub use domain::follow_up::{FollowUpAction, FollowUpCategory};
pub use domain::message::{ConversationState, Message, ToolCall};
pub use domain::record::{IncludedSideband, Record, Relationship, RelationshipData, Resolved};
pub use domain::ui::{ProjectedRow, RowField, UiMessage, UiPayload};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, FlowEvent, FlowState, ToolLoopFlow};
