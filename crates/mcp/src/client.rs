//! RecordAPI's MCP endpoint, reached through rmcp's streamable-HTTP client.
//!
//! `McpClient` holds the connection settings and performs the handshake;
//! the resulting `McpSession` owns the running rmcp service and is shared by
//! every tool it advertised.

use std::future::Future;
use std::time::Duration;

use permitdesk_core::config::RecordApiConfig;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion, RawContent,
    Tool as RemoteTool,
};
use rmcp::service::{RunningService, ServiceError};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{ClientHandler, RoleClient};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::McpError;

const CLIENT_NAME: &str = "permitdesk";

#[derive(Clone)]
struct PermitdeskClientHandler {
    info: ClientInfo,
}

impl ClientHandler for PermitdeskClientHandler {
    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

/// What the server reported during the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSummary {
    pub protocol_version: String,
    pub name: String,
    pub version: String,
}

/// A tool call's text output. `is_error` mirrors the result's `isError` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl From<CallToolResult> for ToolOutput {
    /// Text blocks are joined by newlines and other block kinds are skipped.
    /// A result with no text falls back to its structured content.
    fn from(result: CallToolResult) -> Self {
        let mut text = result
            .content
            .into_iter()
            .filter_map(|content| match content.raw {
                RawContent::Text(block) => Some(block.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            if let Some(structured) = result.structured_content {
                text = structured.to_string();
            }
        }
        Self { text, is_error: result.is_error.unwrap_or(false) }
    }
}

pub struct McpClient {
    url: String,
    api_key: Option<SecretString>,
    protocol_version: ProtocolVersion,
    timeout: Duration,
    http: reqwest::Client,
}

impl McpClient {
    /// Builds the HTTP client without contacting the server.
    pub fn from_config(config: &RecordApiConfig) -> Result<Self, McpError> {
        let protocol_version =
            serde_json::from_value::<ProtocolVersion>(Value::String(config.protocol_version.clone())).map_err(
                |error| McpError::Config(format!("protocol version `{}`: {error}", config.protocol_version)),
            )?;
        let http = reqwest::Client::builder().build().map_err(|error| McpError::Config(error.to_string()))?;

        Ok(Self {
            url: config.url.clone(),
            api_key: config.bearer_token().map(|token| SecretString::from(token.to_string())),
            protocol_version,
            timeout: Duration::from_secs(config.timeout_secs),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs `initialize` and `notifications/initialized`; the transport then
    /// sends the session id and bearer token with every request.
    pub async fn connect(&self) -> Result<McpSession, McpError> {
        let mut transport_config = StreamableHttpClientTransportConfig::with_uri(self.url.clone());
        if let Some(key) = &self.api_key {
            transport_config = transport_config.auth_header(key.expose_secret().to_string());
        }
        let transport = StreamableHttpClientTransport::with_client(self.http.clone(), transport_config);
        let handler = PermitdeskClientHandler { info: self.client_info() };

        let service = tokio::time::timeout(self.timeout, rmcp::serve_client(handler, transport))
            .await
            .map_err(|_| McpError::Timeout { operation: "initialize", seconds: self.timeout.as_secs() })?
            .map_err(|error| McpError::Handshake { url: self.url.clone(), message: error.to_string() })?;

        Ok(McpSession { service, url: self.url.clone(), timeout: self.timeout })
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            protocol_version: self.protocol_version.clone(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: CLIENT_NAME.to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
        }
    }
}

/// An initialized MCP session. Dropping it closes the rmcp service.
pub struct McpSession {
    service: RunningService<RoleClient, PermitdeskClientHandler>,
    url: String,
    timeout: Duration,
}

impl McpSession {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn server(&self) -> Option<ServerSummary> {
        self.service.peer().peer_info().map(|info| ServerSummary {
            protocol_version: info.protocol_version.to_string(),
            name: info.server_info.name.clone(),
            version: info.server_info.version.clone(),
        })
    }

    /// Every advertised tool, following `nextCursor` until the list ends.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        let tools = self.bounded("tools/list", self.service.peer().list_all_tools()).await?;
        debug!(event_name = "mcp.tools.listed", url = %self.url, tools = tools.len(), "record api tools listed");
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, input: Value) -> Result<ToolOutput, McpError> {
        let arguments = match input {
            Value::Object(arguments) => Some(arguments),
            Value::Null => None,
            other => {
                return Err(McpError::InvalidArguments { tool: name.to_string(), found: json_kind(&other) });
            }
        };
        let request = CallToolRequestParam { name: name.to_string().into(), arguments };
        let result = self.bounded("tools/call", self.service.peer().call_tool(request)).await?;
        Ok(ToolOutput::from(result))
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, McpError> {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| McpError::Timeout { operation, seconds: self.timeout.as_secs() })?
            .map_err(|source| McpError::Service { operation, source })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
