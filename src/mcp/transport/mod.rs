//! Tool backend transport shapes.

use crate::core::config::data::ToolBackendConfig;

pub mod streamable_http;

/// JSON-RPC code used by servers to indicate an unsupported method.
pub const MCP_METHOD_NOT_FOUND: i64 = -32601;

/// Supported tool backend transports.
///
/// - [`ToolTransportKind::JsonRpc`] posts JSON-RPC envelopes to one endpoint.
/// - [`ToolTransportKind::Rest`] uses separate health, tools and chat routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolTransportKind {
    JsonRpc,
    Rest,
}

impl ToolTransportKind {
    /// Resolves transport type from config, defaulting to JSON-RPC.
    pub fn from_config(config: &ToolBackendConfig) -> Result<Self, String> {
        let transport = config
            .transport
            .as_deref()
            .unwrap_or("json-rpc")
            .to_ascii_lowercase();
        match transport.as_str() {
            "json-rpc" | "json_rpc" | "jsonrpc" | "mcp" => Ok(ToolTransportKind::JsonRpc),
            "rest" | "http" => Ok(ToolTransportKind::Rest),
            other => Err(format!("Unsupported tool transport: {}", other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolTransportKind::JsonRpc => "json-rpc",
            ToolTransportKind::Rest => "rest",
        }
    }
}
