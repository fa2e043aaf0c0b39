//! Shared constants used across the application

/// Display name given to sessions created without one.
pub const DEFAULT_SESSION_NAME: &str = "New Chat";

/// Whole-request deadline for one chat turn.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Number of prior messages kept when a tool result is folded into the prompt.
pub const DEFAULT_HISTORY_WINDOW: usize = 4;

/// Capacity of the per-request event channel.
pub const STREAM_EVENT_BUFFER: usize = 64;

pub const DEFAULT_TOOL_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOOL_ENDPOINT: &str = "/mcp";
pub const DEFAULT_TOOLS_PATH: &str = "/sse";
pub const DEFAULT_CHAT_PATH: &str = "/chat";
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 10_000;

pub const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3.1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to a patient care system.

When users ask about patient data, it is retrieved for you automatically.
Your job is to have natural conversations and present information clearly.";

/// Environment variables that override the config file.
pub const ENV_TOOL_URL: &str = "TOOLRELAY_TOOL_URL";
pub const ENV_LLM_URL: &str = "TOOLRELAY_LLM_URL";
pub const ENV_MODEL: &str = "TOOLRELAY_MODEL";
pub const ENV_LOG: &str = "TOOLRELAY_LOG";
