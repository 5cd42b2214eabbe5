use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The result of classifying one user utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Free-form chat; route straight to the LLM.
    Conversation { confidence: f64 },
    /// The utterance names (or fuzzy-matches) a registered tool.
    ToolAction {
        tool_name: String,
        params: HashMap<String, Value>,
        confidence: f64,
    },
    /// A question about something already held in memory (e.g. the user's
    /// own name), answerable without a model call.
    MemoryQuery { confidence: f64 },
    /// Too little signal to route; the agent should ask a follow-up.
    Clarification { confidence: f64 },
}

impl Intent {
    pub fn confidence(&self) -> f64 {
        match self {
            Intent::Conversation { confidence }
            | Intent::MemoryQuery { confidence }
            | Intent::Clarification { confidence } => *confidence,
            Intent::ToolAction { confidence, .. } => *confidence,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Conversation { .. } => "CONVERSATION",
            Intent::ToolAction { .. } => "TOOL_ACTION",
            Intent::MemoryQuery { .. } => "MEMORY_QUERY",
            Intent::Clarification { .. } => "CLARIFICATION",
        }
    }
}

/// Registration metadata for a single tool, used both for fuzzy matching
/// during intent classification and for advertising the tool's call
/// contract to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's arguments object.
    pub parameters: Value,
    pub required_params: Vec<String>,
    pub category: String,
    /// Verbs/phrases that, when present in an utterance, bias the fuzzy
    /// matcher toward this tool.
    pub action_keywords: Vec<String>,
}

impl ToolMetadata {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        action_keywords: &[&str],
        required_params: &[&str],
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required_params: required_params.iter().map(|s| s.to_string()).collect(),
            category: category.into(),
            action_keywords: action_keywords.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A scored candidate produced by the fuzzy tool matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolMatch {
    pub tool_name: String,
    pub score: f64,
}
