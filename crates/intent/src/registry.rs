//! In-memory tool registry with fuzzy-match lookup.
//!
//! Structural pattern mirrors the process manager's `RwLock<HashMap<...>>`
//! registry: register-once-at-startup, read-heavy lookups afterward.

use crate::matcher::{self, MIN_MATCH_SCORE};
use crate::types::{ToolMatch, ToolMetadata};
use parking_lot::RwLock;
use std::collections::HashMap;

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, ToolMetadata>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, tool: ToolMetadata) {
        self.tools.write().insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<ToolMetadata> {
        self.tools.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    pub fn all(&self) -> Vec<ToolMetadata> {
        self.tools.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Rank every registered tool against `utterance` and return the top
    /// match, provided it clears [`MIN_MATCH_SCORE`].
    pub fn get_best_match(&self, utterance: &str) -> Option<ToolMatch> {
        let tools = self.tools.read();
        let ranked = matcher::rank(utterance, tools.values());
        ranked.into_iter().find(|m| m.score >= MIN_MATCH_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_with_alarm() -> ToolRegistry {
        let reg = ToolRegistry::new();
        reg.register(ToolMetadata::new(
            "set_alarm",
            "Set an alarm for a specific time",
            "alarms",
            &["set", "alarm", "wake"],
            &["time"],
            json!({"type": "object", "properties": {"time": {"type": "string"}}}),
        ));
        reg
    }

    #[test]
    fn best_match_found_for_clear_utterance() {
        let reg = registry_with_alarm();
        let m = reg.get_best_match("set an alarm for 7am").expect("match");
        assert_eq!(m.tool_name, "set_alarm");
    }

    #[test]
    fn no_match_for_unrelated_utterance() {
        let reg = registry_with_alarm();
        assert!(reg.get_best_match("xylophone quartz nebula").is_none());
    }

    #[test]
    fn register_overwrites_by_name() {
        let reg = registry_with_alarm();
        assert_eq!(reg.len(), 1);
        reg.register(ToolMetadata::new(
            "set_alarm",
            "updated",
            "alarms",
            &[],
            &[],
            json!({}),
        ));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("set_alarm").unwrap().description, "updated");
    }
}
