use super::{protocol, McpToolClient};
use crate::mcp::ToolDescriptor;
use serde_json::{json, Map, Value};
use tracing::debug;

const NO_RESPONSE_TEXT: &str = "No response from server";

impl McpToolClient {
    pub(super) async fn rest_health(&self) -> Result<(), String> {
        let url = self.url_for(self.config.health_path());
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("HTTP error: {}", response.status()))
        }
    }

    pub(super) async fn rest_list_tools(&self) -> Result<Vec<ToolDescriptor>, String> {
        let url = self.url_for(self.config.tools_path());
        debug!(url = %url, "Fetching tool catalog");
        let body = self.get_json(&url).await?;
        let entries = protocol::tool_entries(&body)
            .ok_or_else(|| "No tools found in MCP server response".to_string())?;
        Ok(protocol::decode_tools(entries))
    }

    pub(super) async fn rest_invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, String> {
        let payload = json!({
            "message": name,
            "tool": name,
            "arguments": arguments,
            "history": [],
        });
        let body = self.post_chat(&payload).await?;
        Ok(response_text(&body))
    }

    pub(super) async fn rest_chat(&self, message: &str, history: &[Value]) -> Result<String, String> {
        let payload = json!({
            "message": message,
            "history": history,
        });
        let body = self.post_chat(&payload).await?;
        Ok(response_text(&body))
    }

    async fn post_chat(&self, payload: &Value) -> Result<Value, String> {
        let url = self.url_for(self.config.chat_path());
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }
        response.json::<Value>().await.map_err(|err| err.to_string())
    }

    async fn get_json(&self, url: &str) -> Result<Value, String> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }
        response.json::<Value>().await.map_err(|err| err.to_string())
    }
}

fn response_text(body: &Value) -> String {
    match body.get("response") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => NO_RESPONSE_TEXT.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_falls_back_when_field_missing() {
        assert_eq!(response_text(&json!({"response": "hi"})), "hi");
        assert_eq!(response_text(&json!({"response": null})), NO_RESPONSE_TEXT);
        assert_eq!(response_text(&json!({"other": 1})), NO_RESPONSE_TEXT);
        assert_eq!(response_text(&json!({"response": {"id": 7}})), "{\"id\":7}");
    }
}
