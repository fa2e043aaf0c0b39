//! Model-directed tool selection.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::ToolDecider;
use crate::api::ChatMessage;
use crate::core::chat_stream::CompletionModel;
use crate::core::message::Message;
use crate::mcp::{ToolDescriptor, ToolInvocation};

pub const DECISION_SYSTEM_PROMPT: &str =
    "You are a tool selection assistant. Respond ONLY with valid JSON.";

const CALL_ACTION: &str = "call";

pub struct LlmDecider {
    model: Arc<dyn CompletionModel>,
}

impl LlmDecider {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ToolDecider for LlmDecider {
    async fn decide(
        &self,
        user_message: &str,
        catalog: &[ToolDescriptor],
        recent_history: &[Message],
    ) -> Option<ToolInvocation> {
        if catalog.is_empty() {
            return None;
        }

        let prompt = build_decision_prompt(user_message, catalog, recent_history);
        let messages = vec![
            ChatMessage::system(DECISION_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let response = match self.model.complete(messages).await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "Tool decision request failed");
                return None;
            }
        };
        debug!(response = %response, "Tool decision response");
        parse_decision(&response)
    }
}

/// Renders the prompt asking the model for a single JSON decision.
pub fn build_decision_prompt(
    user_message: &str,
    catalog: &[ToolDescriptor],
    recent_history: &[Message],
) -> String {
    let mut prompt = String::from("Available tools:\n");
    for tool in catalog {
        let _ = write!(
            prompt,
            "{{\n  \"name\": \"{}\",\n  \"description\": \"{}\",\n  \"parameters\": {}\n}}\n\n",
            tool.name,
            tool.description_or_default(),
            tool.parameter_properties()
        );
    }

    if !recent_history.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for message in recent_history {
            let _ = writeln!(prompt, "{}: {}", message.role.as_str(), message.content());
        }
        prompt.push('\n');
    }

    let _ = write!(prompt, "User request: \"{}\"\n\n", user_message);
    prompt.push_str("Analyze the request and respond with ONLY a JSON object:\n\n");
    prompt.push_str(
        "To call a tool:\n{\"action\": \"call\", \"tool\": \"tool_name\", \"arguments\": {...}}\n\n",
    );
    prompt.push_str("If no tool needed:\n{\"action\": \"none\"}\n\n");
    prompt.push_str("Extract values from the user's message. Use numbers for IDs, strings for names.\n");
    prompt.push_str("Return ONLY the JSON, no explanation:");
    prompt
}

/// Reads a decision out of a model reply. Code fences and chatter around the
/// JSON object are tolerated; anything else means no tool.
pub fn parse_decision(response: &str) -> Option<ToolInvocation> {
    let cleaned = response.trim().replace("```json", "").replace("```", "");
    let candidate = json_object_span(&cleaned).unwrap_or(cleaned.trim());

    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Tool decision is not valid JSON");
            return None;
        }
    };

    if value.get("action").and_then(Value::as_str) != Some(CALL_ACTION) {
        return None;
    }

    let tool = value
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?;

    let arguments = match value.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments.clone(),
        Some(other) => {
            debug!(arguments = %other, "Tool decision arguments are not an object");
            return None;
        }
    };

    Some(ToolInvocation::new(tool, arguments))
}

fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::TextStream;
    use futures_util::stream;
    use futures_util::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: Result<String, String>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, String> {
            self.seen.lock().unwrap().push(messages);
            let reply = self.reply.clone()?;
            Ok(stream::iter(vec![Ok(reply)]).boxed())
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("get_patient_by_id", "Look up one patient").with_input_schema(
                json!({"type": "object", "properties": {"patient_id": {"type": "integer"}}}),
            ),
            ToolDescriptor {
                name: "get_all_patients".to_string(),
                description: None,
                input_schema: Value::Null,
            },
        ]
    }

    #[test]
    fn parses_call_with_arguments() {
        let decision = parse_decision(r#"{"action":"call","tool":"t","arguments":{"a":1}}"#)
            .expect("decision");
        assert_eq!(decision.tool, "t");
        assert_eq!(Value::Object(decision.arguments), json!({"a": 1}));
    }

    #[test]
    fn none_action_and_prose_yield_nothing() {
        assert!(parse_decision(r#"{"action":"none"}"#).is_none());
        assert!(parse_decision("I think you should call a tool").is_none());
        assert!(parse_decision("").is_none());
        assert!(parse_decision(r#"{"action":"Call","tool":"t"}"#).is_none());
    }

    #[test]
    fn strips_fences_and_surrounding_chatter() {
        let response = "Sure!\n```json\n{\"action\": \"call\", \"tool\": \"get_all_patients\"}\n```\nDone.";
        let decision = parse_decision(response).expect("decision");
        assert_eq!(decision, ToolInvocation::without_arguments("get_all_patients"));
    }

    #[test]
    fn rejects_missing_tool_and_bad_arguments() {
        assert!(parse_decision(r#"{"action":"call"}"#).is_none());
        assert!(parse_decision(r#"{"action":"call","tool":"  "}"#).is_none());
        assert!(parse_decision(r#"{"action":"call","tool":"t","arguments":[1]}"#).is_none());
        assert!(parse_decision(r#"{"action":"call","tool":"t","arguments":{"a":1}"#).is_none());
    }

    #[test]
    fn prompt_lists_tools_and_request() {
        let prompt = build_decision_prompt("show patient 42", &catalog(), &[]);
        assert!(prompt.starts_with("Available tools:\n{\n  \"name\": \"get_patient_by_id\","));
        assert!(prompt.contains("\"parameters\": {\"patient_id\":{\"type\":\"integer\"}}"));
        assert!(prompt.contains("\"description\": \"No description\",\n  \"parameters\": {}"));
        assert!(prompt.contains("User request: \"show patient 42\"\n\n"));
        assert!(!prompt.contains("Recent conversation:"));
        assert!(prompt.ends_with("Return ONLY the JSON, no explanation:"));
    }

    #[test]
    fn prompt_includes_recent_history() {
        let history = vec![
            Message::user("who is patient 7?"),
            Message::assistant("a1", "Patient 7 is Jane Doe."),
        ];
        let prompt = build_decision_prompt("and her care plan?", &catalog(), &history);
        assert!(prompt.contains(
            "Recent conversation:\nuser: who is patient 7?\nassistant: Patient 7 is Jane Doe.\n\nUser request:"
        ));
    }

    #[tokio::test]
    async fn decider_sends_system_instruction_and_parses_reply() {
        let model = Arc::new(ScriptedModel::replying(
            r#"{"action":"call","tool":"get_patient_by_id","arguments":{"patient_id":42}}"#,
        ));
        let decider = LlmDecider::new(model.clone());

        let decision = decider
            .decide("show me patient id 42", &catalog(), &[])
            .await
            .expect("decision");
        assert_eq!(decision.tool, "get_patient_by_id");
        assert_eq!(decision.arguments.get("patient_id"), Some(&json!(42)));

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0].role, "system");
        assert_eq!(seen[0][0].content, DECISION_SYSTEM_PROMPT);
        assert!(seen[0][1].content.contains("show me patient id 42"));
    }

    #[tokio::test]
    async fn decider_skips_model_without_tools() {
        let model = Arc::new(ScriptedModel::replying(r#"{"action":"call","tool":"x"}"#));
        let decider = LlmDecider::new(model.clone());

        assert!(decider.decide("anything", &[], &[]).await.is_none());
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_failure_means_no_tool() {
        let model = Arc::new(ScriptedModel {
            reply: Err("API Error: overloaded".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let decider = LlmDecider::new(model);
        assert!(decider.decide("list patients", &catalog(), &[]).await.is_none());
    }
}
