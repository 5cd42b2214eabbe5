use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chaos switchboard (file-loadable defaults; overridden at runtime by
// the experiment runner or the AGENT_CHAOS_CONFIG environment variable)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChaosConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub experiment_type: Option<String>,
    #[serde(default = "d_one")]
    pub llm_latency_multiplier: f64,
    #[serde(default)]
    pub rate_limit_probability: f64,
    #[serde(default)]
    pub tool_failure_rate: f64,
    #[serde(default)]
    pub persistence_failure_rate: f64,
    #[serde(default = "d_one")]
    pub memory_inflation_factor: f64,
    #[serde(default)]
    pub long_session_mode: bool,
    /// Guardrail: consecutive tool failures before the experiment runner
    /// declares an emergency stop and tears the experiment down.
    #[serde(default = "d_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            experiment_id: None,
            experiment_type: None,
            llm_latency_multiplier: 1.0,
            rate_limit_probability: 0.0,
            tool_failure_rate: 0.0,
            persistence_failure_rate: 0.0,
            memory_inflation_factor: 1.0,
            long_session_mode: false,
            max_consecutive_failures: d_max_consecutive_failures(),
        }
    }
}

impl ChaosConfig {
    /// Resets every knob this config carries. Unlike the switchboard this
    /// was ported from, every numeric field is reset here — not just the
    /// ones a request happened to touch.
    pub fn disable(&mut self) {
        *self = ChaosConfig {
            experiment_id: self.experiment_id.take(),
            experiment_type: self.experiment_type.take(),
            ..ChaosConfig::default()
        };
    }
}

fn d_one() -> f64 {
    1.0
}
fn d_max_consecutive_failures() -> u32 {
    3
}
