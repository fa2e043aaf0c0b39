use super::protocol::{self, ToolPage};
use super::{
    apply_streamable_http_client_post_headers, apply_streamable_http_protocol_version_header,
    McpToolClient, MCP_SESSION_ID_HEADER,
};
use crate::mcp::transport::streamable_http::{is_event_stream_content_type, next_sse_reply};
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
};
use rust_mcp_schema::{CallToolRequestParams, PaginatedRequestParams, RequestId};
use serde_json::{Map, Value};
use tracing::debug;

impl McpToolClient {
    fn effective_protocol_version(&self) -> String {
        let state = self.state.lock();
        protocol::effective_protocol_version(
            &self.config,
            state.negotiated_protocol_version.as_deref(),
        )
    }

    /// Runs the initialize handshake before a list or call until one
    /// succeeds. Failure is tolerated: stateless backends answer `tools/*`
    /// without a session.
    pub(super) async fn ensure_session(&self) {
        let mut ready = self.session_ready.lock().await;
        if *ready {
            return;
        }
        match self.rpc_handshake().await {
            Ok(()) => *ready = true,
            Err(err) => {
                debug!(error = %err, "Initialize handshake failed; continuing without session");
            }
        }
    }

    /// Stops further handshakes once a backend has served a request.
    pub(super) async fn mark_session_ready(&self) {
        *self.session_ready.lock().await = true;
    }

    pub(super) async fn rpc_handshake(&self) -> Result<(), String> {
        let params = protocol::client_details_for(&self.config);
        let reply = self
            .send_request(RequestFromClient::InitializeRequest(params))
            .await?;
        let result = protocol::parse_reply(reply)?.into_result()?;
        let negotiated = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .filter(|version| !version.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| "Unexpected initialize response.".to_string())?;
        self.state.lock().negotiated_protocol_version = Some(negotiated);

        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await
    }

    /// Fetches one `tools/list` page; `None` when the backend does not
    /// implement the method.
    pub(super) async fn rpc_list_tools_page(
        &self,
        cursor: Option<String>,
    ) -> Result<Option<ToolPage>, String> {
        let params = cursor.map(|cursor| PaginatedRequestParams {
            cursor: Some(cursor),
            meta: None,
        });
        let reply = self
            .send_request(RequestFromClient::ListToolsRequest(params))
            .await?;
        let reply = protocol::parse_reply(reply)?;
        if reply.is_method_not_found() {
            return Ok(None);
        }
        let result = reply.into_result()?;
        protocol::parse_tool_page(&result).map(Some)
    }

    pub(super) async fn rpc_call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, String> {
        let params = CallToolRequestParams::new(name).with_arguments(arguments);
        let reply = self
            .send_request(RequestFromClient::CallToolRequest(params))
            .await?;
        let result = protocol::parse_reply(reply)?.into_result()?;
        Ok(protocol::call_result_text(&result))
    }

    async fn send_request(&self, request: RequestFromClient) -> Result<Value, String> {
        let request_id = self.next_request_id();
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| err.to_string())?;

        let response = self.post_message(&message).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        if is_event_stream_content_type(&content_type) {
            next_sse_reply(response).await
        } else {
            let body = response.bytes().await.map_err(|err| err.to_string())?;
            serde_json::from_slice::<Value>(&body).map_err(|err| err.to_string())
        }
    }

    async fn send_notification(&self, notification: NotificationFromClient) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| err.to_string())?;
        self.post_message(&message).await.map(|_| ())
    }

    async fn post_message(&self, message: &ClientMessage) -> Result<reqwest::Response, String> {
        let payload = serde_json::to_string(message).map_err(|err| err.to_string())?;
        let url = self.url_for(self.config.endpoint());
        debug!(url = %url, "Sending MCP HTTP request");
        let protocol_version = self.effective_protocol_version();
        let mut request = apply_streamable_http_protocol_version_header(
            apply_streamable_http_client_post_headers(self.http.post(&url)),
            Some(protocol_version.as_str()),
        )
        .body(payload);

        if let Some(session_id) = self.session_id() {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }

        let response = request.send().await.map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }

        if let Some(session_id) = response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
        {
            self.state.lock().session_id = Some(session_id);
        }

        Ok(response)
    }
}
