use super::format_rpc_error;
use crate::core::config::data::ToolBackendConfig;
use crate::mcp::transport::MCP_METHOD_NOT_FOUND;
use crate::mcp::{error_text, ToolDescriptor};
use rust_mcp_schema::{
    ClientCapabilities, Implementation, InitializeRequestParams, RpcError,
    LATEST_PROTOCOL_VERSION,
};
use serde_json::Value;
use tracing::debug;

pub(crate) fn requested_protocol_version(config: &ToolBackendConfig) -> String {
    config
        .protocol_version
        .clone()
        .unwrap_or_else(|| LATEST_PROTOCOL_VERSION.to_string())
}

pub(crate) fn effective_protocol_version(
    config: &ToolBackendConfig,
    negotiated_version: Option<&str>,
) -> String {
    match negotiated_version {
        Some(version) if !version.trim().is_empty() => version.to_string(),
        _ => requested_protocol_version(config),
    }
}

pub(crate) fn client_details_for(config: &ToolBackendConfig) -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "toolrelay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("toolrelay gateway".to_string()),
            description: Some("Chat gateway routing turns through MCP tools".to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: requested_protocol_version(config),
    }
}

/// Outcome of decoding one JSON-RPC reply envelope.
#[derive(Debug)]
pub(crate) enum Reply {
    Result(Value),
    Error(RpcError),
}

impl Reply {
    pub(crate) fn into_result(self) -> Result<Value, String> {
        match self {
            Reply::Result(value) => Ok(value),
            Reply::Error(error) => Err(format_rpc_error(&error)),
        }
    }

    pub(crate) fn is_method_not_found(&self) -> bool {
        matches!(self, Reply::Error(error) if error.code == MCP_METHOD_NOT_FOUND)
    }
}

/// Splits a reply envelope into its `result` or `error` member.
pub(crate) fn parse_reply(envelope: Value) -> Result<Reply, String> {
    let Value::Object(mut members) = envelope else {
        return Err("Malformed JSON-RPC reply: expected an object.".to_string());
    };
    if let Some(error) = members.remove("error") {
        return Ok(Reply::Error(decode_rpc_error(error)));
    }
    members
        .remove("result")
        .map(Reply::Result)
        .ok_or_else(|| "Malformed JSON-RPC reply: missing result.".to_string())
}

fn decode_rpc_error(error: Value) -> RpcError {
    match serde_json::from_value::<RpcError>(error.clone()) {
        Ok(error) => error,
        Err(_) => RpcError {
            code: 0,
            message: error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
            data: None,
        },
    }
}

/// One page of a `tools/list` result.
pub(crate) struct ToolPage {
    pub tools: Vec<ToolDescriptor>,
    pub next_cursor: Option<String>,
}

pub(crate) fn parse_tool_page(result: &Value) -> Result<ToolPage, String> {
    let tools = tool_entries(result)
        .ok_or_else(|| "Malformed tool list: missing tools array.".to_string())?;
    let next_cursor = result
        .get("nextCursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string);
    Ok(ToolPage {
        tools: decode_tools(tools),
        next_cursor,
    })
}

/// Accepts `{"tools": [...]}` or a bare array.
pub(crate) fn tool_entries(body: &Value) -> Option<&Vec<Value>> {
    match body {
        Value::Array(entries) => Some(entries),
        other => other.get("tools").and_then(Value::as_array),
    }
}

pub(crate) fn decode_tools(entries: &[Value]) -> Vec<ToolDescriptor> {
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<ToolDescriptor>(entry.clone()) {
            Ok(tool) if !tool.name.trim().is_empty() => Some(tool),
            Ok(_) => None,
            Err(err) => {
                debug!(error = %err, "Skipping malformed tool entry");
                None
            }
        })
        .collect()
}

/// Extracts the text handed back to the conversation from a `tools/call`
/// result.
pub(crate) fn call_result_text(result: &Value) -> String {
    let first = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|content| content.first());
    let text = match first {
        Some(element) => element
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| element.to_string()),
        None => result
            .get("structuredContent")
            .unwrap_or(result)
            .to_string(),
    };

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        error_text(text)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn effective_protocol_prefers_negotiated() {
        let config = ToolBackendConfig {
            protocol_version: Some("2025-01-01".to_string()),
            ..Default::default()
        };

        assert_eq!(
            effective_protocol_version(&config, Some("2025-11-25")),
            "2025-11-25"
        );
        assert_eq!(effective_protocol_version(&config, Some("  ")), "2025-01-01");
        assert_eq!(effective_protocol_version(&config, None), "2025-01-01");
        assert_eq!(
            requested_protocol_version(&ToolBackendConfig::default()),
            LATEST_PROTOCOL_VERSION
        );
    }

    #[test]
    fn parse_reply_separates_result_and_error() {
        let ok = parse_reply(json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}}))
            .expect("valid envelope");
        match ok {
            Reply::Result(value) => assert_eq!(value, json!({"tools": []})),
            Reply::Error(error) => panic!("unexpected error reply: {error:?}"),
        }

        let err = parse_reply(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .expect("valid envelope");
        assert!(err.is_method_not_found());
        assert_eq!(
            err.into_result(),
            Err("MCP error -32601: Method not found".to_string())
        );

        assert!(parse_reply(json!({"jsonrpc": "2.0", "id": 3})).is_err());
        assert!(parse_reply(json!([1, 2])).is_err());
    }

    #[test]
    fn tool_page_skips_nameless_entries_and_keeps_cursor() {
        let page = parse_tool_page(&json!({
            "tools": [
                {"name": "get_patient_by_id", "description": "Look up a patient",
                 "inputSchema": {"type": "object", "properties": {"patient_id": {"type": "integer"}}}},
                {"description": "no name"},
                {"name": "get_all_patients"}
            ],
            "nextCursor": "page-2"
        }))
        .expect("valid page");

        let names: Vec<&str> = page.tools.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["get_patient_by_id", "get_all_patients"]);
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
        assert_eq!(page.tools[1].description, None);
    }

    #[test]
    fn call_result_text_prefers_first_text_element() {
        let result = json!({
            "content": [
                {"type": "text", "text": "{\"id\": 42}"},
                {"type": "text", "text": "ignored"}
            ]
        });
        assert_eq!(call_result_text(&result), "{\"id\": 42}");
    }

    #[test]
    fn call_result_text_marks_tool_errors_and_falls_back_to_json() {
        let failed = json!({"content": [{"type": "text", "text": "no such patient"}], "isError": true});
        assert_eq!(call_result_text(&failed), "Error: no such patient");

        let bare = json!({"structuredContent": {"count": 3}});
        assert_eq!(call_result_text(&bare), "{\"count\":3}");
    }
}
