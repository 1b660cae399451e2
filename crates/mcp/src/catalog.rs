use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use permitdesk_agent::tools::{Tool, ToolCatalog, ToolDescriptor, ToolSet};
use permitdesk_core::config::RecordApiConfig;
use rmcp::model::Tool as RemoteTool;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{McpClient, McpSession};
use crate::McpError;

/// RecordAPI's tool catalog, reached over MCP.
pub struct McpCatalog {
    client: McpClient,
}

impl McpCatalog {
    pub fn new(client: McpClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &RecordApiConfig) -> Result<Self, McpError> {
        Ok(Self::new(McpClient::from_config(config)?))
    }
}

#[async_trait]
impl ToolCatalog for McpCatalog {
    async fn connect(&self) -> Result<ToolSet> {
        let session = Arc::new(self.client.connect().await?);
        let server = session.server();
        info!(
            event_name = "mcp.session.initialized",
            url = session.url(),
            protocol_version = server.as_ref().map(|server| server.protocol_version.as_str()).unwrap_or("unknown"),
            server_name = server.as_ref().map(|server| server.name.as_str()).unwrap_or("unknown"),
            "record api session initialized"
        );

        let mut tools = ToolSet::default();
        for remote in session.list_tools().await? {
            tools.register(McpTool { session: Arc::clone(&session), descriptor: descriptor(remote) });
        }
        Ok(tools)
    }
}

fn descriptor(remote: RemoteTool) -> ToolDescriptor {
    ToolDescriptor::new(remote.name.to_string(), remote.description.map(|text| text.to_string()).unwrap_or_default())
        .with_schema(Value::Object((*remote.input_schema).clone()))
}

/// One remote tool. Its output is the concatenated text content of the call
/// result; a result flagged `isError` becomes an `Err`.
pub struct McpTool {
    session: Arc<McpSession>,
    descriptor: ToolDescriptor,
}

#[async_trait]
impl Tool for McpTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let name = self.descriptor.name.as_str();
        let output = self.session.call_tool(name, input).await.map_err(|error| {
            warn!(
                event_name = "mcp.tool.call_failed",
                tool = name,
                transient = error.is_transient(),
                error = %error,
                "record api tool call failed"
            );
            error
        })?;
        if output.is_error {
            return Err(McpError::ToolFailed { tool: name.to_string(), message: output.text }.into());
        }
        Ok(Value::String(output.text))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rmcp::model::Tool as RemoteTool;
    use serde_json::{json, Map};

    use super::descriptor;

    #[test]
    fn remote_tool_keeps_its_input_schema() {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), json!({ "community": { "type": "string" } }));

        let described = descriptor(RemoteTool::new("get_records", "Search records", Arc::new(schema)));

        assert_eq!(described.name, "get_records");
        assert_eq!(described.description, "Search records");
        assert_eq!(described.input_schema["properties"]["community"]["type"], json!("string"));
    }
}
