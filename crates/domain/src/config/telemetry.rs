use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Telemetry (per-turn metric thresholds, history retention, OTel export)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    /// How many completed-turn `RequestMetrics` to retain in memory.
    #[serde(default = "d_history_len")]
    pub history_len: usize,
    /// Consecutive fully-healthy turns required to declare recovery.
    #[serde(default = "d_recovery_turns")]
    pub recovery_turns: u32,
    #[serde(default)]
    pub otel: ObservabilityConfig,
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdsConfig::default(),
            history_len: d_history_len(),
            recovery_turns: d_recovery_turns(),
            otel: ObservabilityConfig::default(),
            guardrails: GuardrailsConfig::default(),
        }
    }
}

/// Hard per-session limits, independent of the warning/critical thresholds
/// above — these latch `emergency_stop` rather than just logging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    #[serde(default = "d_max_tokens_per_session")]
    pub max_tokens_per_session: u64,
    #[serde(default = "d_max_retries_per_request")]
    pub max_retries_per_request: u32,
    #[serde(default = "d_max_session_duration_seconds")]
    pub max_session_duration_seconds: u64,
    #[serde(default = "d_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_session: d_max_tokens_per_session(),
            max_retries_per_request: d_max_retries_per_request(),
            max_session_duration_seconds: d_max_session_duration_seconds(),
            max_consecutive_failures: d_max_consecutive_failures(),
        }
    }
}

fn d_max_tokens_per_session() -> u64 {
    200_000
}
fn d_max_retries_per_request() -> u32 {
    3
}
fn d_max_session_duration_seconds() -> u64 {
    3_600
}
fn d_max_consecutive_failures() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "d_context_tokens")]
    pub context_tokens: MetricThreshold,
    #[serde(default = "d_llm_latency")]
    pub llm_latency: MetricThreshold,
    #[serde(default = "d_first_chunk_latency")]
    pub first_chunk_latency: MetricThreshold,
    #[serde(default = "d_retries_per_request")]
    pub retries_per_request: MetricThreshold,
    #[serde(default = "d_memory_retrieval_count")]
    pub memory_retrieval_count: MetricThreshold,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            context_tokens: d_context_tokens(),
            llm_latency: d_llm_latency(),
            first_chunk_latency: d_first_chunk_latency(),
            retries_per_request: d_retries_per_request(),
            memory_retrieval_count: d_memory_retrieval_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub warning: f64,
    pub critical: f64,
}

/// OpenTelemetry trace export. When `otlp_endpoint` is `None` (the
/// default), no exporter is started and only structured JSON logging runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "d_service_name")]
    pub service_name: String,
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_history_len() -> usize {
    500
}
fn d_recovery_turns() -> u32 {
    3
}
fn d_service_name() -> String {
    "conductor".into()
}
fn d_sample_rate() -> f64 {
    1.0
}
fn d_context_tokens() -> MetricThreshold {
    MetricThreshold {
        warning: 8500.0,
        critical: 12000.0,
    }
}
fn d_llm_latency() -> MetricThreshold {
    MetricThreshold {
        warning: 5.0,
        critical: 8.0,
    }
}
fn d_first_chunk_latency() -> MetricThreshold {
    MetricThreshold {
        warning: 2.5,
        critical: 4.5,
    }
}
fn d_retries_per_request() -> MetricThreshold {
    MetricThreshold {
        warning: 1.0,
        critical: 3.0,
    }
}
fn d_memory_retrieval_count() -> MetricThreshold {
    MetricThreshold {
        warning: 2.0,
        critical: 5.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_documented_baseline() {
        let t = ThresholdsConfig::default();
        assert_eq!(t.context_tokens.warning, 8500.0);
        assert_eq!(t.context_tokens.critical, 12000.0);
        assert_eq!(t.llm_latency.warning, 5.0);
        assert_eq!(t.first_chunk_latency.critical, 4.5);
        assert_eq!(t.retries_per_request.warning, 1.0);
        assert_eq!(t.memory_retrieval_count.critical, 5.0);
    }

    #[test]
    fn default_recovery_turns_is_three() {
        assert_eq!(TelemetryConfig::default().recovery_turns, 3);
    }

    #[test]
    fn default_has_no_otlp_endpoint() {
        assert!(TelemetryConfig::default().otel.otlp_endpoint.is_none());
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: TelemetryConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.history_len, 500);
    }
}
