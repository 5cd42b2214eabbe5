use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Destructive potential of a tool, totally ordered so a caller's role can
/// be checked against it with a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    ReadOnly,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::ReadOnly => "READ_ONLY",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "READ_ONLY" | "READONLY" => Some(RiskLevel::ReadOnly),
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's standing, totally ordered against the risk levels it may
/// invoke via [`UserRole::max_risk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Guest,
    User,
    Trusted,
    Admin,
}

impl UserRole {
    /// The highest risk level a caller in this role may trigger.
    pub fn max_risk(&self) -> RiskLevel {
        match self {
            UserRole::Guest => RiskLevel::Low,
            UserRole::User => RiskLevel::Medium,
            UserRole::Trusted => RiskLevel::High,
            UserRole::Admin => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Guest => "GUEST",
            UserRole::User => "USER",
            UserRole::Trusted => "TRUSTED",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GUEST" => Some(UserRole::Guest),
            "USER" | "STANDARD_USER" => Some(UserRole::User),
            "TRUSTED" => Some(UserRole::Trusted),
            "ADMIN" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps tool names to their static risk classification. Unknown tools
/// default to `HIGH` — an unrecognized side-effectful action is treated as
/// dangerous until proven otherwise, never as harmless.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    levels: HashMap<String, RiskLevel>,
}

impl RiskPolicy {
    pub fn new(levels: HashMap<String, RiskLevel>) -> Self {
        Self { levels }
    }

    /// The built-in policy for the voice-agent tool catalogue (§4.7,
    /// §2 table), before any config-layer overrides are applied.
    pub fn default_policy() -> Self {
        let mut levels = HashMap::new();
        // READ_ONLY
        levels.insert("get_current_datetime".into(), RiskLevel::ReadOnly);
        levels.insert("get_date".into(), RiskLevel::ReadOnly);
        levels.insert("get_time".into(), RiskLevel::ReadOnly);
        // LOW
        levels.insert("get_weather".into(), RiskLevel::Low);
        levels.insert("search_web".into(), RiskLevel::Low);
        // MEDIUM
        levels.insert("list_alarms".into(), RiskLevel::Medium);
        levels.insert("list_reminders".into(), RiskLevel::Medium);
        levels.insert("list_notes".into(), RiskLevel::Medium);
        levels.insert("read_note".into(), RiskLevel::Medium);
        levels.insert("list_calendar_events".into(), RiskLevel::Medium);
        // HIGH
        levels.insert("set_alarm".into(), RiskLevel::High);
        levels.insert("delete_alarm".into(), RiskLevel::High);
        levels.insert("set_reminder".into(), RiskLevel::High);
        levels.insert("delete_reminder".into(), RiskLevel::High);
        levels.insert("create_note".into(), RiskLevel::High);
        levels.insert("delete_note".into(), RiskLevel::High);
        levels.insert("create_calendar_event".into(), RiskLevel::High);
        levels.insert("delete_calendar_event".into(), RiskLevel::High);
        levels.insert("send_email".into(), RiskLevel::High);
        levels.insert("open_app".into(), RiskLevel::High);
        levels.insert("close_app".into(), RiskLevel::High);
        // CRITICAL: none assigned by default; reserved for future
        // destructive tools.
        Self::new(levels)
    }

    /// Apply config-layer overrides (tool name -> risk level string) on top
    /// of the default policy. Unparsable overrides are logged and skipped.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Self {
        for (tool, level) in overrides {
            match RiskLevel::parse(level) {
                Some(risk) => {
                    self.levels.insert(tool.clone(), risk);
                }
                None => {
                    tracing::warn!(tool = %tool, value = %level, "ignoring unparsable risk override");
                }
            }
        }
        self
    }

    /// The risk level of a tool, defaulting to `HIGH` when unregistered.
    pub fn risk(&self, tool_name: &str) -> RiskLevel {
        self.levels
            .get(tool_name)
            .copied()
            .unwrap_or(RiskLevel::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_matches_spec() {
        assert!(UserRole::Guest < UserRole::User);
        assert!(UserRole::User < UserRole::Trusted);
        assert!(UserRole::Trusted < UserRole::Admin);
    }

    #[test]
    fn risk_ordering_matches_spec() {
        assert!(RiskLevel::ReadOnly < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn unknown_tool_defaults_to_high() {
        let policy = RiskPolicy::default_policy();
        assert_eq!(policy.risk("some_unregistered_tool"), RiskLevel::High);
    }

    #[test]
    fn admin_max_risk_is_critical() {
        assert_eq!(UserRole::Admin.max_risk(), RiskLevel::Critical);
    }

    #[test]
    fn overrides_replace_default_classification() {
        let mut overrides = HashMap::new();
        overrides.insert("open_app".to_string(), "critical".to_string());
        let policy = RiskPolicy::default_policy().with_overrides(&overrides);
        assert_eq!(policy.risk("open_app"), RiskLevel::Critical);
    }
}
