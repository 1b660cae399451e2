use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Name, description and JSON-schema argument spec advertised to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), input_schema: empty_object_schema() }
    }

    pub fn with_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = input_schema;
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;
    async fn execute(&self, input: Value) -> Result<Value>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// The tools exposed by one catalog connection, keyed by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor().clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("tools", &self.names()).finish()
    }
}

/// Performs the handshake with a remote tool catalog.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    async fn connect(&self) -> Result<ToolSet>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogStatus {
    Connected { tools: usize },
    Unavailable { error: String },
}

struct LoadedTools {
    tools: Arc<ToolSet>,
    status: CatalogStatus,
}

/// Connects to the tool catalog once per process and hands out the cached set.
///
/// A failed first connection is remembered as an empty set; there is no
/// invalidation, so a restart is required to retry.
pub struct ToolRegistry {
    catalog: Arc<dyn ToolCatalog>,
    loaded: OnceCell<LoadedTools>,
}

impl ToolRegistry {
    pub fn new(catalog: Arc<dyn ToolCatalog>) -> Self {
        Self { catalog, loaded: OnceCell::new() }
    }

    /// A registry whose tools are known up front; no handshake ever runs.
    pub fn preloaded(tools: ToolSet) -> Self {
        let status = CatalogStatus::Connected { tools: tools.len() };
        Self {
            catalog: Arc::new(NoCatalog),
            loaded: OnceCell::new_with(Some(LoadedTools { tools: Arc::new(tools), status })),
        }
    }

    pub async fn get_tools(&self) -> Arc<ToolSet> {
        Arc::clone(&self.load().await.tools)
    }

    /// Whether the handshake has run and how it went. `None` before first use.
    pub fn status(&self) -> Option<CatalogStatus> {
        self.loaded.get().map(|loaded| loaded.status.clone())
    }

    async fn load(&self) -> &LoadedTools {
        self.loaded
            .get_or_init(|| async {
                match self.catalog.connect().await {
                    Ok(tools) => {
                        info!(
                            event_name = "tools.catalog_connected",
                            tools = tools.len(),
                            names = ?tools.names(),
                            "tool catalog connected"
                        );
                        let status = CatalogStatus::Connected { tools: tools.len() };
                        LoadedTools { tools: Arc::new(tools), status }
                    }
                    Err(error) => {
                        warn!(
                            event_name = "tools.catalog_unavailable",
                            error = %format!("{error:#}"),
                            "tool catalog handshake failed; continuing without record tools"
                        );
                        LoadedTools {
                            tools: Arc::new(ToolSet::default()),
                            status: CatalogStatus::Unavailable { error: format!("{error:#}") },
                        }
                    }
                }
            })
            .await
    }
}

struct NoCatalog;

#[async_trait]
impl ToolCatalog for NoCatalog {
    async fn connect(&self) -> Result<ToolSet> {
        Ok(ToolSet::default())
    }
}

/// Text placed into a ToolResult for a successful call.
pub fn tool_output_text(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
