//! In-memory registry of chat sessions.
//!
//! Sessions live in a sharded [`DashMap`], so operations on different ids do
//! not contend. Each entry guards its state with its own mutex: every
//! operation on one id is linearized, and the map's shard lock is released
//! before that mutex is taken. Nothing is persisted; a restart drops all
//! sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::core::constants::DEFAULT_SESSION_NAME;
use crate::core::error::GatewayError;
use crate::core::message::{Feedback, Message};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub name: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

struct SessionEntry {
    state: Mutex<ChatSession>,
    turn: tokio::sync::Mutex<()>,
}

/// Shared reference to one stored session.
///
/// Cloning the handle clones the reference, not the session. A handle stays
/// usable after the session is deleted from the store; writes through it are
/// simply no longer visible to the store.
#[derive(Clone)]
pub struct SessionHandle {
    entry: Arc<SessionEntry>,
}

impl SessionHandle {
    fn new(session: ChatSession) -> Self {
        Self {
            entry: Arc::new(SessionEntry {
                state: Mutex::new(session),
                turn: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn id(&self) -> String {
        self.entry.state.lock().id.clone()
    }

    pub fn snapshot(&self) -> ChatSession {
        self.entry.state.lock().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.entry.state.lock().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.entry.state.lock().messages.len()
    }

    pub fn append(&self, message: Message) {
        self.entry.state.lock().push(message);
    }

    /// Waits for exclusive use of this session's conversation.
    ///
    /// The orchestrator holds the guard for a whole chat turn so that two
    /// requests against the same session cannot interleave their history reads
    /// and appends.
    pub async fn lock_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.entry.turn.lock().await
    }

    fn rename(&self, name: &str) {
        let mut state = self.entry.state.lock();
        state.name = name.to_string();
        state.touch();
    }

    fn clear(&self) {
        let mut state = self.entry.state.lock();
        state.messages.clear();
        state.touch();
    }

    fn set_feedback(
        &self,
        message_id: &str,
        feedback: Option<Feedback>,
    ) -> Result<Message, GatewayError> {
        let mut state = self.entry.state.lock();
        let message = state
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
            .ok_or_else(|| GatewayError::MessageNotFound(message_id.to_string()))?;
        message.feedback = feedback;
        Ok(message.clone())
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: Option<&str>) -> ChatSession {
        self.create_with_id(&Uuid::new_v4().to_string(), name)
    }

    /// Stores a fresh session under `id`, replacing any existing record.
    pub fn create_with_id(&self, id: &str, name: Option<&str>) -> ChatSession {
        let session = ChatSession::new(id, name.unwrap_or(DEFAULT_SESSION_NAME));
        let snapshot = session.clone();
        if self
            .sessions
            .insert(id.to_string(), SessionHandle::new(session))
            .is_some()
        {
            debug!(session_id = id, "Replaced existing session");
        }
        snapshot
    }

    pub fn get(&self, id: &str) -> Option<ChatSession> {
        self.handle(id).map(|handle| handle.snapshot())
    }

    pub fn handle(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn list_all(&self) -> Vec<ChatSession> {
        let handles: Vec<SessionHandle> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        handles.iter().map(SessionHandle::snapshot).collect()
    }

    pub fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn rename(&self, id: &str, new_name: &str) -> bool {
        match self.handle(id) {
            Some(handle) => {
                handle.rename(new_name);
                true
            }
            None => false,
        }
    }

    pub fn clear_messages(&self, id: &str) -> bool {
        match self.handle(id) {
            Some(handle) => {
                handle.clear();
                true
            }
            None => false,
        }
    }

    /// Records (or with `None`, removes) a reaction on one message.
    pub fn set_feedback(
        &self,
        session_id: &str,
        message_id: &str,
        feedback: Option<Feedback>,
    ) -> Result<Message, GatewayError> {
        let handle = self
            .handle(session_id)
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;
        let message = handle.set_feedback(message_id, feedback)?;
        debug!(session_id, message_id, ?feedback, "Updated message feedback");
        Ok(message)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
