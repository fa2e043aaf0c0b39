//! One chat turn, end to end.
//!
//! The [`Orchestrator`] appends the user's message, lets the configured
//! [`ToolDecider`] pick an optional tool call, folds the tool result into the
//! prompt, streams the model's answer out as [`StreamEvent`]s and commits the
//! assistant message once generation completes.
//!
//! Turns against the same session are serialized by the session's turn lock.
//! A turn that fails, times out or is cancelled keeps the user message but
//! records nothing for the assistant.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ChatMessage;
use crate::core::chat_stream::{build_completion_model, CompletionModel};
use crate::core::config::data::{Config, OrchestratorConfig};
use crate::core::constants::{
    DEFAULT_HISTORY_WINDOW, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYSTEM_PROMPT,
    STREAM_EVENT_BUFFER,
};
use crate::core::error::GatewayError;
use crate::core::message::{new_message_id, Message};
use crate::core::session::{SessionHandle, SessionStore};
use crate::decision::{build_decider, ToolDecider};
use crate::mcp::client::McpToolClient;
use crate::mcp::{ToolClient, ToolDescriptor};

/// Events of one chat turn, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The user's message was stored under this id.
    UserAck { message_id: String },
    /// Generation is starting; the assistant message will carry this id.
    Start { message_id: String },
    Chunk { content: String },
    Done { message_id: String },
    Error { error: String },
}

impl StreamEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::UserAck { .. } => "userMessage",
            StreamEvent::Start { .. } => "start",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            StreamEvent::UserAck { message_id } => json!({ "id": message_id }),
            StreamEvent::Start { message_id } | StreamEvent::Done { message_id } => {
                json!({ "messageId": message_id })
            }
            StreamEvent::Chunk { content } => json!({ "content": content }),
            StreamEvent::Error { error } => json!({ "error": error }),
        }
    }

    /// Renders the event as one server-sent-events frame.
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.payload())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// An inbound chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub auth_token: Option<String>,
}

impl ChatRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn has_auth_token(&self) -> bool {
        self.auth_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub request_timeout: Duration,
    /// Prior messages kept next to a tool result, and shown to the decider.
    pub history_window: usize,
    pub system_prompt: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            history_window: DEFAULT_HISTORY_WINDOW,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            history_window: config.history_window(),
            system_prompt: config.system_prompt().to_string(),
        }
    }
}

/// A turn running on its own task.
pub struct ChatStream {
    pub events: mpsc::Receiver<StreamEvent>,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<Result<Message, GatewayError>>,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<SessionStore>,
    tools: Arc<dyn ToolClient>,
    decider: Arc<dyn ToolDecider>,
    model: Arc<dyn CompletionModel>,
    settings: Arc<OrchestratorSettings>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        tools: Arc<dyn ToolClient>,
        decider: Arc<dyn ToolDecider>,
        model: Arc<dyn CompletionModel>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            tools,
            decider,
            model,
            settings: Arc::new(settings),
        }
    }

    /// Wires the HTTP tool client, the configured model and decision strategy
    /// around `store`.
    pub fn from_config(config: &Config, store: Arc<SessionStore>) -> Result<Self, String> {
        let tools = McpToolClient::new(config.tool_backend.clone())?;
        let model = build_completion_model(&config.llm)?;
        let decider = build_decider(&config.decision, Arc::clone(&model))?;
        debug!(
            transport = tools.transport_kind().as_str(),
            model = config.llm.model(),
            "Gateway configured"
        );
        Ok(Self::new(
            store,
            Arc::new(tools),
            decider,
            model,
            OrchestratorSettings::from_config(&config.orchestrator),
        ))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<dyn ToolClient> {
        &self.tools
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Starts a turn on a new task.
    pub fn spawn(&self, request: ChatRequest) -> ChatStream {
        let (tx, rx) = mpsc::channel(STREAM_EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let orchestrator = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { orchestrator.run(request, tx, token).await });
        ChatStream {
            events: rx,
            cancel,
            handle,
        }
    }

    /// Runs a turn to completion and returns the committed assistant message.
    pub async fn chat(&self, request: ChatRequest) -> Result<Message, GatewayError> {
        let (tx, mut rx) = mpsc::channel(STREAM_EVENT_BUFFER);
        let drain = async move { while rx.recv().await.is_some() {} };
        let (result, ()) = tokio::join!(self.run(request, tx, CancellationToken::new()), drain);
        result
    }

    /// Drives one turn, emitting its events into `events`.
    ///
    /// Every turn ends with exactly one `Done` or `Error` event, unless it was
    /// cancelled (through `cancel` or by dropping the receiver), in which case
    /// nothing further is sent.
    pub async fn run(
        &self,
        request: ChatRequest,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<Message, GatewayError> {
        let Some(session) = self.store.handle(&request.session_id) else {
            let err = GatewayError::SessionNotFound(request.session_id.clone());
            warn!(session_id = %request.session_id, "Chat request for unknown session");
            let _ = events
                .send(StreamEvent::Error {
                    error: err.to_string(),
                })
                .await;
            return Err(err);
        };

        let deadline = self.settings.request_timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            _ = events.closed() => Err(GatewayError::Cancelled),
            result = tokio::time::timeout(deadline, self.turn(&session, &request, &events)) => {
                result.unwrap_or(Err(GatewayError::Timeout(deadline)))
            }
        };

        match &outcome {
            Ok(message) => {
                debug!(session_id = %request.session_id, message_id = %message.id, "Chat turn complete");
            }
            Err(GatewayError::Cancelled) => {
                info!(session_id = %request.session_id, "Chat turn cancelled");
            }
            Err(err) => {
                warn!(session_id = %request.session_id, error = %err, "Chat turn failed");
                let _ = events
                    .send(StreamEvent::Error {
                        error: err.to_string(),
                    })
                    .await;
            }
        }
        outcome
    }

    async fn turn(
        &self,
        session: &SessionHandle,
        request: &ChatRequest,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<Message, GatewayError> {
        let _turn = session.lock_turn().await;

        let prior = session.messages();
        let user_message = Message::user(request.message.clone());
        let user_id = user_message.id.clone();
        session.append(user_message);
        emit(events, StreamEvent::UserAck { message_id: user_id }).await?;

        let catalog = self.tools.list_tools().await;
        let recent = recent_window(&prior, self.settings.history_window);
        let decision = self.decider.decide(&request.message, &catalog, recent).await;

        let context = match decision {
            Some(invocation) => {
                info!(
                    session_id = %request.session_id,
                    tool = %invocation.tool,
                    "Invoking tool"
                );
                let result = self
                    .tools
                    .invoke(&invocation.tool, invocation.arguments)
                    .await;
                self.tool_context(request, &prior, &catalog, &result)
            }
            None => self.plain_context(request, &prior, &catalog),
        };

        let assistant_id = new_message_id();
        emit(
            events,
            StreamEvent::Start {
                message_id: assistant_id.clone(),
            },
        )
        .await?;

        let mut fragments = self
            .model
            .stream(context)
            .await
            .map_err(GatewayError::Generation)?;
        let mut content = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment.map_err(GatewayError::Generation)?;
            if fragment.is_empty() {
                continue;
            }
            content.push_str(&fragment);
            emit(events, StreamEvent::Chunk { content: fragment }).await?;
        }
        drop(fragments);

        // Reserve before committing so the append and `Done` are never split
        // by an await the deadline or cancellation could interrupt.
        let permit = events.reserve().await.map_err(|_| GatewayError::Cancelled)?;
        let message = Message::assistant(assistant_id.clone(), content);
        session.append(message.clone());
        permit.send(StreamEvent::Done {
            message_id: assistant_id,
        });
        Ok(message)
    }

    fn preamble(&self, request: &ChatRequest, catalog: &[ToolDescriptor]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(format!(
            "{}\n\n{}",
            self.settings.system_prompt,
            describe_capabilities(catalog)
        ))];
        if request.has_auth_token() {
            messages.push(ChatMessage::system("Authentication is available."));
        }
        messages
    }

    fn plain_context(
        &self,
        request: &ChatRequest,
        prior: &[Message],
        catalog: &[ToolDescriptor],
    ) -> Vec<ChatMessage> {
        let mut messages = self.preamble(request, catalog);
        messages.extend(prior.iter().map(Message::to_chat_message));
        messages.push(ChatMessage::user(request.message.clone()));
        messages
    }

    fn tool_context(
        &self,
        request: &ChatRequest,
        prior: &[Message],
        catalog: &[ToolDescriptor],
        tool_result: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = self.preamble(request, catalog);
        messages.push(ChatMessage::system(tool_result_instructions(
            &request.message,
            tool_result,
        )));
        messages.extend(
            recent_window(prior, self.settings.history_window)
                .iter()
                .map(Message::to_chat_message),
        );
        messages.push(ChatMessage::user(request.message.clone()));
        messages
    }
}

async fn emit(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<(), GatewayError> {
    events.send(event).await.map_err(|_| GatewayError::Cancelled)
}

fn recent_window(messages: &[Message], window: usize) -> &[Message] {
    &messages[messages.len().saturating_sub(window)..]
}

fn describe_capabilities(catalog: &[ToolDescriptor]) -> String {
    if catalog.is_empty() {
        return "No tools available.".to_string();
    }
    let mut description = String::from("Available capabilities:\n\n");
    for tool in catalog {
        description.push_str("- ");
        description.push_str(tool.description_or_default());
        description.push('\n');
    }
    description
}

fn tool_result_instructions(question: &str, tool_result: &str) -> String {
    format!(
        "The user asked: \"{question}\"\n\n\
Retrieved data:\n{tool_result}\n\n\
Format this information clearly and professionally.\n\
Present it in a natural, conversational way.\n\
Use formatting (headings, lists, tables) where helpful.\n\
Do not mention JSON or technical details."
    )
}
