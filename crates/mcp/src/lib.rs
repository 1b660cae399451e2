//! RecordAPI tool catalog client.
//!
//! RecordAPI exposes its record, applicant, location and record type queries
//! as MCP tools over streamable HTTP. `McpCatalog` performs the handshake and
//! turns the advertised tools into a `ToolSet` the agent can call.

mod catalog;
pub mod client;

pub use catalog::{McpCatalog, McpTool};
pub use client::{McpClient, McpSession, ServerSummary, ToolOutput};

use rmcp::service::ServiceError;
use thiserror::Error;

/// Errors raised while talking to the MCP endpoint
#[derive(Error, Debug)]
pub enum McpError {
    #[error("record api client configuration: {0}")]
    Config(String),

    #[error("mcp handshake with {url} failed: {message}")]
    Handshake { url: String, message: String },

    #[error("mcp `{operation}` timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("mcp `{operation}` failed: {source}")]
    Service {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    #[error("arguments for `{tool}` must be a JSON object, got {found}")]
    InvalidArguments { tool: String, found: &'static str },

    #[error("tool `{tool}` failed: {message}")]
    ToolFailed { tool: String, message: String },
}

impl McpError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            McpError::Handshake { .. } | McpError::Timeout { .. } => true,
            // A JSON-RPC error reply is the server's answer; anything else is the transport.
            McpError::Service { source, .. } => !matches!(source, ServiceError::McpError(_)),
            McpError::Config(_) | McpError::InvalidArguments { .. } | McpError::ToolFailed { .. } => false,
        }
    }
}
