//! Keyword/pattern intent classifier. No model call is made here — this is
//! the fast, deterministic first pass the turn orchestrator runs before ever
//! touching the LLM.
//!
//! Resolution order:
//! 1. Empty utterance -> `Clarification`.
//! 2. Identity/memory recall phrasing -> `MemoryQuery` if memory context is
//!    available, else `Conversation` (nothing to recall from).
//! 3. Greetings, thanks, and very short utterances with no action verb ->
//!    `Conversation`.
//! 4. An action verb plus a fuzzy tool match above the classifier threshold
//!    -> `ToolAction`.
//! 5. A bare domain keyword (no action verb) that still resolves a tool via
//!    category fallback -> `ToolAction`.
//! 6. Short, vague phrases with no resolvable tool -> `Clarification`.
//! 7. Otherwise -> `Conversation` at a modest default confidence.

use crate::matcher::{CLASSIFIER_ACTION_THRESHOLD, MIN_MATCH_SCORE};
use crate::registry::ToolRegistry;
use crate::types::Intent;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

const ACTION_VERBS: &[&str] = &[
    "set", "create", "add", "make", "cancel", "delete", "remove", "open", "close", "launch",
    "quit", "send", "schedule", "start", "stop", "search", "look up", "find", "check",
];

const IDENTITY_PATTERNS: &[&str] = &[
    "what's my name",
    "what is my name",
    "who am i",
    "do you remember me",
    "do you know my name",
    "what do you know about me",
];

const GREETING_PATTERNS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "ok", "okay", "bye", "goodbye", "yo",
];

pub struct IntentClassifier;

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        utterance: &str,
        memory_context: Option<&str>,
        registry: &ToolRegistry,
    ) -> Intent {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            return Intent::Clarification { confidence: 1.0 };
        }

        let normalized = trimmed.to_lowercase();

        if IDENTITY_PATTERNS.iter().any(|p| normalized.contains(p)) {
            return match memory_context {
                Some(ctx) if !ctx.trim().is_empty() => Intent::MemoryQuery { confidence: 0.9 },
                _ => Intent::Conversation { confidence: 0.7 },
            };
        }

        let word_count = normalized.split_whitespace().count();
        let has_action_verb = ACTION_VERBS.iter().any(|v| normalized.contains(v));

        if !has_action_verb
            && word_count <= 3
            && GREETING_PATTERNS.iter().any(|g| normalized.contains(g))
        {
            return Intent::Conversation { confidence: 0.95 };
        }

        if has_action_verb {
            if let Some(best) = registry.get_best_match(trimmed) {
                if best.score >= CLASSIFIER_ACTION_THRESHOLD {
                    let confidence = (best.score / 100.0).min(0.99);
                    if let Some(tool) = registry.get(&best.tool_name) {
                        let params = extract_params(trimmed, &tool.name, &tool.required_params);
                        return Intent::ToolAction {
                            tool_name: tool.name,
                            params,
                            confidence,
                        };
                    }
                }
            }
        }

        // Domain-keyword fallback: no action verb detected, but the
        // utterance still resolves cleanly to a single tool by category.
        // `get_best_match` already enforces `MIN_MATCH_SCORE`, the same
        // routing default used everywhere else a bare match is accepted.
        if let Some(best) = registry.get_best_match(trimmed) {
            if best.score >= MIN_MATCH_SCORE {
                if let Some(tool) = registry.get(&best.tool_name) {
                    let confidence = (best.score / 100.0 * 0.9).min(0.9);
                    let params = extract_params(trimmed, &tool.name, &tool.required_params);
                    return Intent::ToolAction {
                        tool_name: tool.name,
                        params,
                        confidence,
                    };
                }
            }
        }

        if word_count <= 4 {
            return Intent::Clarification { confidence: 0.5 };
        }

        Intent::Conversation { confidence: 0.6 }
    }
}

fn quoted_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["']([^"']+)["']"#).unwrap())
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap())
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:in|at|for)\s+([A-Za-z][A-Za-z\s]{1,30})$").unwrap())
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\d{1,2}(?::\d{2})?\s*(?:am|pm)\b|\b([01]?\d|2[0-3]):[0-5]\d\b").unwrap()
    })
}

/// Best-effort slot extraction: quoted strings become `text`/`content`,
/// emails become `recipient`, `in/at/for <city>` becomes `location`
/// (weather/calendar tools), a clock expression (`8am`, `14:30`) becomes
/// `time` for `set_alarm`, and verb-stripped remainders become `app_name`
/// for `open_app`/`close_app`.
fn extract_params(utterance: &str, tool_name: &str, required: &[String]) -> HashMap<String, Value> {
    let mut params = HashMap::new();

    if let Some(caps) = email_re().find(utterance) {
        params.insert("recipient".to_string(), Value::String(caps.as_str().to_string()));
    }

    if let Some(caps) = quoted_string_re().captures(utterance) {
        let text = caps.get(1).unwrap().as_str().to_string();
        let key = if required.iter().any(|r| r == "content") {
            "content"
        } else if required.iter().any(|r| r == "title") {
            "title"
        } else {
            "text"
        };
        params.insert(key.to_string(), Value::String(text));
    }

    if matches!(tool_name, "get_weather" | "create_calendar_event" | "get_calendar_events") {
        if let Some(caps) = location_re().captures(utterance) {
            let loc = caps.get(1).unwrap().as_str().trim().to_string();
            params.insert("location".to_string(), Value::String(loc));
        }
    }

    if tool_name == "set_alarm" {
        if let Some(m) = time_re().find(utterance) {
            params.insert("time".to_string(), Value::String(m.as_str().trim().to_string()));
        }
    }

    if matches!(tool_name, "open_app" | "close_app") {
        let mut normalized = utterance.to_lowercase();
        for verb in ["open", "close", "launch", "quit", "start", "stop", "please"] {
            normalized = normalized.replace(verb, "");
        }
        let app_name = normalized.trim().to_string();
        if !app_name.is_empty() {
            params.insert("app_name".to_string(), Value::String(app_name));
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolMetadata;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let reg = ToolRegistry::new();
        reg.register(ToolMetadata::new(
            "set_alarm",
            "Set an alarm for a specific time",
            "alarms",
            &["set", "alarm", "wake"],
            &["time"],
            json!({"type": "object", "properties": {"time": {"type": "string"}}}),
        ));
        reg.register(ToolMetadata::new(
            "send_email",
            "Send an email to a recipient",
            "email",
            &["send", "email", "message"],
            &["recipient"],
            json!({"type": "object", "properties": {"recipient": {"type": "string"}, "body": {"type": "string"}}}),
        ));
        reg.register(ToolMetadata::new(
            "open_app",
            "Open an application by name",
            "apps",
            &["open", "launch", "start"],
            &["app_name"],
            json!({"type": "object", "properties": {"app_name": {"type": "string"}}}),
        ));
        reg
    }

    #[test]
    fn empty_utterance_is_clarification() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        assert!(matches!(
            classifier.classify("", None, &reg),
            Intent::Clarification { .. }
        ));
    }

    #[test]
    fn identity_question_is_memory_query_with_context() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        let intent = classifier.classify("what's my name?", Some("user_name: Alex"), &reg);
        assert!(matches!(intent, Intent::MemoryQuery { .. }));
    }

    #[test]
    fn identity_question_without_context_falls_back_to_conversation() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        let intent = classifier.classify("what's my name?", None, &reg);
        assert!(matches!(intent, Intent::Conversation { .. }));
    }

    #[test]
    fn greeting_is_conversation() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        assert!(matches!(
            classifier.classify("hey there", None, &reg),
            Intent::Conversation { .. }
        ));
    }

    #[test]
    fn clear_action_verb_resolves_tool_action() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        let intent = classifier.classify("set an alarm for 7am", None, &reg);
        match intent {
            Intent::ToolAction { tool_name, params, .. } => {
                assert_eq!(tool_name, "set_alarm");
                assert_eq!(params.get("time").unwrap(), "7am");
            }
            other => panic!("expected ToolAction, got {other:?}"),
        }
    }

    #[test]
    fn s1_set_alarm_extracts_time_slot() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        let intent = classifier.classify("set an alarm for 8am", None, &reg);
        match intent {
            Intent::ToolAction { tool_name, params, .. } => {
                assert_eq!(tool_name, "set_alarm");
                assert_eq!(params.get("time").unwrap(), "8am");
            }
            other => panic!("expected ToolAction, got {other:?}"),
        }
    }

    #[test]
    fn open_app_extracts_app_name() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        let intent = classifier.classify("open spotify", None, &reg);
        match intent {
            Intent::ToolAction { tool_name, params, .. } => {
                assert_eq!(tool_name, "open_app");
                assert_eq!(params.get("app_name").unwrap(), "spotify");
            }
            other => panic!("expected ToolAction, got {other:?}"),
        }
    }

    #[test]
    fn email_address_extracted_as_recipient() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        let intent = classifier.classify("send an email to alex@example.com", None, &reg);
        match intent {
            Intent::ToolAction { params, .. } => {
                assert_eq!(params.get("recipient").unwrap(), "alex@example.com");
            }
            other => panic!("expected ToolAction, got {other:?}"),
        }
    }

    #[test]
    fn vague_short_phrase_is_clarification() {
        let classifier = IntentClassifier::new();
        let reg = registry();
        assert!(matches!(
            classifier.classify("do the thing", None, &reg),
            Intent::Clarification { .. }
        ));
    }
}
