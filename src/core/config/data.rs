use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{
    DEFAULT_API_KEY_ENV, DEFAULT_CHAT_PATH, DEFAULT_HEALTH_PATH, DEFAULT_HISTORY_WINDOW,
    DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TOOLS_PATH, DEFAULT_TOOL_BASE_URL, DEFAULT_TOOL_ENDPOINT, DEFAULT_TOOL_TIMEOUT_MS,
    ENV_LLM_URL, ENV_MODEL, ENV_TOOL_URL,
};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "ToolBackendConfig::is_empty")]
    pub tool_backend: ToolBackendConfig,
    #[serde(default, skip_serializing_if = "LlmConfig::is_empty")]
    pub llm: LlmConfig,
    #[serde(default, skip_serializing_if = "DecisionConfig::is_empty")]
    pub decision: DecisionConfig,
    #[serde(default, skip_serializing_if = "OrchestratorConfig::is_empty")]
    pub orchestrator: OrchestratorConfig,
}

/// Where and how the MCP tool backend is reached.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct ToolBackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// `json-rpc` (default) or `rest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
}

impl ToolBackendConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_TOOL_BASE_URL)
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_TOOL_ENDPOINT)
    }

    pub fn tools_path(&self) -> &str {
        self.tools_path.as_deref().unwrap_or(DEFAULT_TOOLS_PATH)
    }

    pub fn chat_path(&self) -> &str {
        self.chat_path.as_deref().unwrap_or(DEFAULT_CHAT_PATH)
    }

    pub fn health_path(&self) -> &str {
        self.health_path.as_deref().unwrap_or(DEFAULT_HEALTH_PATH)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TOOL_TIMEOUT_MS))
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LlmConfig {
    /// `openai` (default) or `mock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl LlmConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_LLM_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct DecisionConfig {
    /// `llm` (default) or `pattern`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl DecisionConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct OrchestratorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl OrchestratorConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn history_window(&self) -> usize {
        self.history_window.unwrap_or(DEFAULT_HISTORY_WINDOW)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

impl Config {
    /// Returns a copy with every unset field filled with its default value.
    pub fn resolved(&self) -> Config {
        Config {
            tool_backend: ToolBackendConfig {
                base_url: Some(self.tool_backend.base_url().to_string()),
                transport: Some(
                    self.tool_backend
                        .transport
                        .clone()
                        .unwrap_or_else(|| "json-rpc".to_string()),
                ),
                endpoint: Some(self.tool_backend.endpoint().to_string()),
                tools_path: Some(self.tool_backend.tools_path().to_string()),
                chat_path: Some(self.tool_backend.chat_path().to_string()),
                health_path: Some(self.tool_backend.health_path().to_string()),
                timeout_ms: Some(self.tool_backend.timeout().as_millis() as u64),
                protocol_version: self.tool_backend.protocol_version.clone(),
            },
            llm: LlmConfig {
                provider: Some(
                    self.llm
                        .provider
                        .clone()
                        .unwrap_or_else(|| "openai".to_string()),
                ),
                base_url: Some(self.llm.base_url().to_string()),
                model: Some(self.llm.model().to_string()),
                api_key_env: Some(self.llm.api_key_env().to_string()),
            },
            decision: DecisionConfig {
                strategy: Some(
                    self.decision
                        .strategy
                        .clone()
                        .unwrap_or_else(|| "llm".to_string()),
                ),
            },
            orchestrator: OrchestratorConfig {
                request_timeout_secs: Some(self.orchestrator.request_timeout().as_secs()),
                history_window: Some(self.orchestrator.history_window()),
                system_prompt: Some(self.orchestrator.system_prompt().to_string()),
            },
        }
    }

    /// Applies `TOOLRELAY_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup(ENV_TOOL_URL) {
            self.tool_backend.base_url = Some(url);
        }
        if let Some(url) = lookup(ENV_LLM_URL) {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.llm.model = Some(model);
        }
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
