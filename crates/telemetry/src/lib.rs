//! Chaos switchboard, guardrails, and per-turn telemetry for the
//! resilient conversation orchestrator.

pub mod chaos;
pub mod guardrails;
pub mod metrics;
pub mod report;

pub use chaos::ChaosSwitchboard;
pub use guardrails::{GuardrailLimits, Guardrails};
pub use metrics::{MetricsCollector, Phase, RequestMetrics, Severity, ThresholdBreach, Thresholds};
pub use report::{ChaosExperimentReport, DegradationAnalysis, PhaseSummary};
