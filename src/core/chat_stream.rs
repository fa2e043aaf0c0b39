//! The LLM port.
//!
//! [`CompletionModel`] is what the orchestrator and the LLM decision strategy
//! talk to. [`OpenAiCompatibleModel`] streams from any `/chat/completions`
//! endpoint that speaks OpenAI-style SSE (OpenAI, Ollama's `/v1`, vLLM, ...);
//! [`MockModel`] answers offline with canned replies.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use memchr::memchr;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::config::data::LlmConfig;
use crate::core::message::ROLE_USER;
use crate::utils::url::construct_api_url;

/// Ordered text fragments; an `Err` item ends generation.
pub type TextStream = BoxStream<'static, Result<String, String>>;

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, String>;

    /// Non-streaming completion: the concatenation of [`Self::stream`].
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, String> {
        let mut fragments = self.stream(messages).await?;
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

/// Which [`CompletionModel`] implementation the config selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAiCompatible,
    Mock,
}

impl LlmProvider {
    pub fn from_config(config: &LlmConfig) -> Result<Self, String> {
        let provider = config
            .provider
            .as_deref()
            .unwrap_or("openai")
            .to_ascii_lowercase();
        match provider.as_str() {
            "openai" | "openai-compatible" | "ollama" => Ok(LlmProvider::OpenAiCompatible),
            "mock" => Ok(LlmProvider::Mock),
            other => Err(format!("Unsupported LLM provider: {}", other)),
        }
    }
}

/// Builds the configured model. The API key is read from the environment
/// variable named by `api_key_env`; a missing key is fine for local servers.
pub fn build_completion_model(config: &LlmConfig) -> Result<Arc<dyn CompletionModel>, String> {
    match LlmProvider::from_config(config)? {
        LlmProvider::Mock => Ok(Arc::new(MockModel::new())),
        LlmProvider::OpenAiCompatible => {
            let api_key = std::env::var(config.api_key_env())
                .ok()
                .filter(|key| !key.trim().is_empty());
            Ok(Arc::new(OpenAiCompatibleModel::new(
                config.base_url(),
                config.model(),
                api_key,
            )?))
        }
    }
}

enum SseEvent {
    Fragment(String),
    Done,
    Failed(String),
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

fn classify_data_payload(payload: &str) -> Option<SseEvent> {
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map(SseEvent::Fragment),
        Err(_) => {
            if payload.trim().is_empty() {
                return None;
            }
            Some(SseEvent::Failed(format_api_error(payload)))
        }
    }
}

fn process_sse_line(line: &str) -> Option<SseEvent> {
    extract_data_payload(line).and_then(classify_data_payload)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// Renders an upstream error body as a one-line summary plus the raw payload.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let compact = json_value.to_string();
        return match extract_error_summary(&json_value) {
            Some(summary) if !summary.is_empty() => format!("API Error: {summary} ({compact})"),
            _ => format!("API Error: {compact}"),
        };
    }

    format!("API Error: {trimmed}")
}

struct SseState {
    bytes: BoxStream<'static, Result<Vec<u8>, String>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, String>>,
    finished: bool,
}

impl SseState {
    /// Queues events for every complete line in the buffer. Returns true once
    /// the stream has ended, normally or with an error.
    fn drain_lines(&mut self, flush: bool) -> bool {
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if self.handle_line(&line) {
                return true;
            }
        }
        if flush && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            return self.handle_line(&line);
        }
        false
    }

    fn handle_line(&mut self, line: &[u8]) -> bool {
        let line = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(err) => {
                warn!(error = %err, "Invalid UTF-8 in completion stream");
                return false;
            }
        };
        match process_sse_line(line) {
            Some(SseEvent::Fragment(text)) => {
                self.pending.push_back(Ok(text));
                false
            }
            Some(SseEvent::Done) => true,
            Some(SseEvent::Failed(error)) => {
                self.pending.push_back(Err(error));
                true
            }
            None => false,
        }
    }
}

fn sse_text_stream(bytes: BoxStream<'static, Result<Vec<u8>, String>>) -> TextStream {
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.finished = state.drain_lines(false);
                }
                Some(Err(err)) => {
                    state.pending.push_back(Err(err));
                    state.finished = true;
                }
                None => {
                    state.drain_lines(true);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

const LLM_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Streams completions from an OpenAI-compatible `/chat/completions` route.
pub struct OpenAiCompatibleModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(LLM_CONNECT_TIMEOUT_SECONDS))
            .build()
            .map_err(|err| err.to_string())?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompatibleModel {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: true,
        };
        let chat_url = construct_api_url(&self.base_url, "chat/completions");
        debug!(url = %chat_url, model = %self.model, "Requesting completion stream");

        let mut http_request = self
            .client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");
        if let Some(api_key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|err| format_api_error(&err.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(format_api_error(&error_text));
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(|err| err.to_string()))
            .boxed();
        Ok(sse_text_stream(bytes))
    }
}

/// Offline responder with a handful of canned replies, streamed word by word.
#[derive(Debug, Clone, Default)]
pub struct MockModel {
    delay: Duration,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses between fragments, to make streaming visible.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn reply_to(message: &str) -> String {
        match message.trim().to_lowercase().as_str() {
            "hello" | "hi" => "Hello! How can I assist you today?".to_string(),
            "help" => {
                "I'm here to help! You can ask me anything about the Model Context Protocol."
                    .to_string()
            }
            "bye" | "goodbye" => "Goodbye! Have a great day!".to_string(),
            _ => format!(
                "I received your message: \"{message}\". This is a mock response. \
Configure an LLM endpoint to get real responses."
            ),
        }
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|message| message.role == ROLE_USER)
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let reply = Self::reply_to(last_user);
        let fragments: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();
        let delay = self.delay;

        Ok(stream::iter(fragments)
            .then(move |fragment| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(fragment)
            })
            .boxed())
    }
}
