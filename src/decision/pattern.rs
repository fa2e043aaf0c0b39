//! Deterministic tool selection from a fixed table of intent rules.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::{advertised, ToolDecider};
use crate::core::message::Message;
use crate::mcp::{ToolDescriptor, ToolInvocation};

pub const LIST_ALL_TOOL: &str = "get_all_patients";
pub const BY_NAME_TOOL: &str = "get_patient_by_name";
pub const BY_ID_TOOL: &str = "get_patient_by_id";
pub const PROGRESS_NOTES_TOOL: &str = "get_progress_notes";
pub const CARE_PLAN_TOOL: &str = "get_care_plan";

const LIST_ALL_PHRASES: &[&str] = &[
    "all patients",
    "list patients",
    "list all patients",
    "show patients",
    "every patient",
];

pub struct PatternDecider {
    progress_note: Regex,
    care_plan: Regex,
    named: Regex,
    patient_id: Regex,
}

impl PatternDecider {
    pub fn new() -> Result<Self, String> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|err| err.to_string());
        Ok(Self {
            progress_note: compile(r"\bprogress\s+notes?\b\D*(\d+)")?,
            care_plan: compile(r"\bcare\s+plans?\b\D*(\d+)")?,
            named: compile(r"\b(?i:named|called)\s+([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)+)")?,
            patient_id: compile(r"(?:\bpatient\b|\bid\b|#)\s*(?:id\b)?\s*[:#]?\s*(\d+)")?,
        })
    }

    /// Applies the rules in order; the first one whose tool is advertised and
    /// whose pattern matches wins.
    pub fn match_message(&self, message: &str, catalog: &[ToolDescriptor]) -> Option<ToolInvocation> {
        if catalog.is_empty() {
            return None;
        }
        let lowered = message.to_lowercase();

        if advertised(catalog, LIST_ALL_TOOL).is_some()
            && LIST_ALL_PHRASES.iter().any(|phrase| lowered.contains(phrase))
        {
            return Some(ToolInvocation::without_arguments(LIST_ALL_TOOL));
        }

        for (pattern, tool) in [
            (&self.progress_note, PROGRESS_NOTES_TOOL),
            (&self.care_plan, CARE_PLAN_TOOL),
        ] {
            if advertised(catalog, tool).is_none() {
                continue;
            }
            if let Some(id) = first_id(pattern, &lowered) {
                return Some(with_argument(tool, "patient_id", json!(id)));
            }
        }

        if advertised(catalog, BY_NAME_TOOL).is_some() {
            if let Some(captures) = self.named.captures(message) {
                let name = captures[1].split_whitespace().collect::<Vec<_>>().join(" ");
                return Some(with_argument(BY_NAME_TOOL, "name", json!(name)));
            }
        }

        if advertised(catalog, BY_ID_TOOL).is_some() {
            if let Some(id) = first_id(&self.patient_id, &lowered) {
                return Some(with_argument(BY_ID_TOOL, "patient_id", json!(id)));
            }
        }

        None
    }
}

#[async_trait]
impl ToolDecider for PatternDecider {
    async fn decide(
        &self,
        user_message: &str,
        catalog: &[ToolDescriptor],
        _recent_history: &[Message],
    ) -> Option<ToolInvocation> {
        self.match_message(user_message, catalog)
    }
}

/// Parses the first captured id; an id that overflows does not match.
fn first_id(pattern: &Regex, text: &str) -> Option<i64> {
    let captures = pattern.captures(text)?;
    captures[1].parse::<i64>().ok()
}

fn with_argument(tool: &str, key: &str, value: Value) -> ToolInvocation {
    let mut arguments = Map::new();
    arguments.insert(key.to_string(), value);
    ToolInvocation::new(tool, arguments)
}
