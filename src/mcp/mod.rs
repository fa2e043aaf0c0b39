//! Tool backend access.
//!
//! [`ToolClient`] is the seam the orchestrator talks to. The concrete
//! [`client::McpToolClient`] speaks either JSON-RPC over streamable HTTP or the
//! plain REST shape, selected by [`transport::ToolTransportKind`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod client;
pub mod transport;

/// One tool advertised by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: Value::Null,
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn description_or_default(&self) -> &str {
        self.description.as_deref().unwrap_or("No description")
    }

    /// The `properties` object of the input schema, or `{}` when absent.
    pub fn parameter_properties(&self) -> Value {
        self.input_schema
            .get("properties")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// A decided tool call: which tool and with what arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }

    pub fn without_arguments(tool: impl Into<String>) -> Self {
        Self::new(tool, Map::new())
    }
}

/// Transport to the tool backend.
///
/// None of these operations fail: transport problems degrade to `false`, an
/// empty catalog, or an `Error: ...` string, and are recorded in
/// [`ToolClient::last_error`].
#[async_trait]
pub trait ToolClient: Send + Sync {
    /// Health probe.
    async fn initialize(&self) -> bool;

    async fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Returns the text of the first content element of the result.
    async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> String;

    /// Relays a message to the backend's own chat endpoint.
    async fn passthrough_chat(&self, message: &str, history: &[Value]) -> String;

    fn last_error(&self) -> Option<String>;
}

/// Formats a transport failure the way it is surfaced inline to the LLM.
pub fn error_text(message: impl AsRef<str>) -> String {
    format!("Error: {}", message.as_ref())
}
