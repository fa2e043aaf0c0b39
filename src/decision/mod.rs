//! Per-turn tool selection.
//!
//! A [`ToolDecider`] looks at the user's message and the advertised tool
//! catalog and decides whether one tool should be called first. Two
//! strategies are available: [`llm::LlmDecider`] asks the model for a JSON
//! decision, [`pattern::PatternDecider`] applies a fixed table of intent rules.
//! Neither ever fails; anything unexpected means "no tool".

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::chat_stream::CompletionModel;
use crate::core::config::data::DecisionConfig;
use crate::core::message::Message;
use crate::mcp::{ToolDescriptor, ToolInvocation};

pub mod llm;
pub mod pattern;

#[async_trait]
pub trait ToolDecider: Send + Sync {
    async fn decide(
        &self,
        user_message: &str,
        catalog: &[ToolDescriptor],
        recent_history: &[Message],
    ) -> Option<ToolInvocation>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionStrategy {
    Llm,
    Pattern,
}

impl DecisionStrategy {
    pub fn from_config(config: &DecisionConfig) -> Result<Self, String> {
        let strategy = config
            .strategy
            .as_deref()
            .unwrap_or("llm")
            .trim()
            .to_ascii_lowercase();
        match strategy.as_str() {
            "llm" | "model" => Ok(DecisionStrategy::Llm),
            "pattern" | "patterns" | "rules" => Ok(DecisionStrategy::Pattern),
            other => Err(format!("Unsupported decision strategy: {}", other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStrategy::Llm => "llm",
            DecisionStrategy::Pattern => "pattern",
        }
    }
}

/// Builds the decider selected by `config`. The LLM strategy shares `model`
/// with generation.
pub fn build_decider(
    config: &DecisionConfig,
    model: Arc<dyn CompletionModel>,
) -> Result<Arc<dyn ToolDecider>, String> {
    match DecisionStrategy::from_config(config)? {
        DecisionStrategy::Llm => Ok(Arc::new(llm::LlmDecider::new(model))),
        DecisionStrategy::Pattern => Ok(Arc::new(pattern::PatternDecider::new()?)),
    }
}

/// Looks a tool up by exact name.
pub(crate) fn advertised<'a>(catalog: &'a [ToolDescriptor], name: &str) -> Option<&'a ToolDescriptor> {
    catalog.iter().find(|tool| tool.name == name)
}
