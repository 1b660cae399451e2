//! Agent runtime for the permit records assistant.
//!
//! One user turn flows through these pieces:
//! 1. **Tool catalog** (`tools`) - `ToolRegistry` connects to RecordAPI's tool
//!    catalog once per process and caches the tool set.
//! 2. **Model** (`llm`) - `LlmClient` decides between a text answer and tool calls.
//! 3. **Controller** (`conversation`) - runs the AwaitingDecision / ExecutingTools
//!    loop and always hands control back to the model after tools run.
//! 4. **Projection** (`pipeline`, `resolver`) - record query results are enriched
//!    with applicant, location and record type names and turned into a table or
//!    detail payload for the UI.
//! 5. **Follow-ups** (`follow_up`) - after the final answer a second model call
//!    suggests next prompts, falling back to a default set.
//!
//! The model never sees UI payloads; it only reads ToolResult text and the
//! one-line summaries that accompany each payload.

pub mod conversation;
pub mod follow_up;
pub mod llm;
pub mod pipeline;
pub mod resolver;
pub mod runtime;
pub mod tools;

pub use conversation::{ControllerSettings, ConversationController, TurnError, TurnFailure, TurnOutcome};
pub use follow_up::FollowUpSuggester;
pub use llm::{ChatCompletionsClient, LlmClient, ModelReply};
pub use pipeline::{Projection, RecordProjectionPipeline};
pub use resolver::RelationshipResolver;
pub use runtime::AgentRuntime;
pub use tools::{CatalogStatus, Tool, ToolCatalog, ToolDescriptor, ToolRegistry, ToolSet};
