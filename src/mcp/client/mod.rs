use crate::core::config::data::ToolBackendConfig;
use crate::mcp::transport::ToolTransportKind;
use crate::mcp::{error_text, ToolClient, ToolDescriptor};
use crate::utils::url::construct_api_url;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_mcp_schema::RpcError;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

mod protocol;
mod transport_http;
mod transport_rest;

const MCP_MAX_TOOL_LIST: usize = 100;
const MCP_JSON_CONTENT_TYPE: &str = "application/json";
const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";
const MCP_HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const MCP_HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const MCP_HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

fn build_mcp_http_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(MCP_HTTP_CONNECT_TIMEOUT_SECONDS))
        .pool_idle_timeout(Duration::from_secs(MCP_HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(MCP_HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
        .map_err(|err| err.to_string())
}

fn apply_streamable_http_client_post_headers(
    request: reqwest::RequestBuilder,
) -> reqwest::RequestBuilder {
    request
        .header("Content-Type", MCP_JSON_CONTENT_TYPE)
        .header("Accept", MCP_JSON_AND_SSE_ACCEPT)
}

fn apply_streamable_http_protocol_version_header(
    request: reqwest::RequestBuilder,
    protocol_version: Option<&str>,
) -> reqwest::RequestBuilder {
    match protocol_version {
        Some(protocol_version) if !protocol_version.trim().is_empty() => {
            request.header(MCP_PROTOCOL_VERSION_HEADER, protocol_version)
        }
        _ => request,
    }
}

#[derive(Default)]
struct ClientState {
    session_id: Option<String>,
    negotiated_protocol_version: Option<String>,
    last_error: Option<String>,
}

/// HTTP client for the tool backend.
///
/// Shared by every request task; all mutable state sits behind short-lived
/// locks so concurrent calls do not serialize on each other.
pub struct McpToolClient {
    config: ToolBackendConfig,
    kind: ToolTransportKind,
    http: reqwest::Client,
    next_id: AtomicI64,
    state: Mutex<ClientState>,
    session_ready: tokio::sync::Mutex<bool>,
}

impl McpToolClient {
    pub fn new(config: ToolBackendConfig) -> Result<Self, String> {
        let kind = ToolTransportKind::from_config(&config)?;
        Ok(Self {
            config,
            kind,
            http: build_mcp_http_client()?,
            next_id: AtomicI64::new(0),
            state: Mutex::new(ClientState::default()),
            session_ready: tokio::sync::Mutex::new(false),
        })
    }

    pub fn transport_kind(&self) -> ToolTransportKind {
        self.kind
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    fn url_for(&self, path: &str) -> String {
        construct_api_url(self.config.base_url(), path)
    }

    fn next_request_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_error(&self, operation: &str, error: &str) {
        warn!(
            operation,
            transport = self.kind.as_str(),
            url = self.config.base_url(),
            error,
            "Tool backend call failed"
        );
        self.state.lock().last_error = Some(error.to_string());
    }

    /// Bounds one backend call, handshake included, by the configured timeout.
    async fn within_timeout<T, F>(&self, call: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, String>>,
    {
        let limit = self.config.timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(format!(
                "Tool backend timed out after {}ms",
                limit.as_millis()
            )),
        }
    }

    async fn list_tools_inner(&self) -> Result<Vec<ToolDescriptor>, String> {
        match self.kind {
            ToolTransportKind::Rest => self.within_timeout(self.rest_list_tools()).await,
            ToolTransportKind::JsonRpc => {
                self.within_timeout(async {
                    self.ensure_session().await;
                    let tools = self.rpc_list_tools().await?;
                    self.mark_session_ready().await;
                    Ok::<_, String>(tools)
                })
                .await
            }
        }
    }

    async fn rpc_list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let Some(page) = self.rpc_list_tools_page(cursor).await? else {
                break;
            };
            tools.extend(page.tools);
            if tools.len() >= MCP_MAX_TOOL_LIST {
                tools.truncate(MCP_MAX_TOOL_LIST);
                break;
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(tools)
    }
}

#[async_trait]
impl ToolClient for McpToolClient {
    async fn initialize(&self) -> bool {
        let outcome = match self.kind {
            ToolTransportKind::Rest => self.within_timeout(self.rest_health()).await,
            ToolTransportKind::JsonRpc => {
                let outcome = self.within_timeout(self.rpc_handshake()).await;
                if outcome.is_ok() {
                    self.mark_session_ready().await;
                }
                outcome
            }
        };
        match outcome {
            Ok(()) => {
                info!(url = self.config.base_url(), "Tool backend is reachable");
                true
            }
            Err(err) => {
                self.record_error("initialize", &err);
                false
            }
        }
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        match self.list_tools_inner().await {
            Ok(tools) => {
                debug!(count = tools.len(), "Loaded tool catalog");
                tools
            }
            Err(err) => {
                self.record_error("list_tools", &err);
                Vec::new()
            }
        }
    }

    async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> String {
        debug!(tool = name, "Invoking tool");
        let outcome = match self.kind {
            ToolTransportKind::Rest => {
                self.within_timeout(self.rest_invoke(name, arguments)).await
            }
            ToolTransportKind::JsonRpc => {
                self.within_timeout(async {
                    self.ensure_session().await;
                    let text = self.rpc_call_tool(name, arguments).await?;
                    self.mark_session_ready().await;
                    Ok::<_, String>(text)
                })
                .await
            }
        };
        match outcome {
            Ok(text) => text,
            Err(err) => {
                self.record_error("invoke", &err);
                error_text(err)
            }
        }
    }

    async fn passthrough_chat(&self, message: &str, history: &[Value]) -> String {
        let outcome = match self.kind {
            ToolTransportKind::Rest => self.within_timeout(self.rest_chat(message, history)).await,
            ToolTransportKind::JsonRpc => {
                Err("chat passthrough requires the rest transport".to_string())
            }
        };
        match outcome {
            Ok(text) => text,
            Err(err) => {
                self.record_error("passthrough_chat", &err);
                error_text(format!("Unable to communicate with MCP server - {err}"))
            }
        }
    }

    fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }
}

fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details {
            if !details.is_empty() {
                output.push('\n');
                output.push_str(&details);
            }
        }
    }
    output
}
