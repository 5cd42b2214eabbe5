//! Per-turn telemetry: `RequestMetrics` history, warning/
//! critical thresholds, and the recovery tracker that declares a chaos
//! experiment "recovered" after three consecutive healthy turns.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The position of a turn within a chaos experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Baseline,
    Chaos,
    Recovery,
}

/// Per-turn telemetry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub context_size: usize,
    pub llm_latency: f64,
    pub stream_first_chunk_latency: f64,
    pub tool_calls_count: u32,
    pub retry_count: u32,
    pub probe_failures: u32,
    pub memory_retrieval_count: u32,
    pub stt_downtime: f64,
    pub tts_downtime: f64,
    pub reconnect_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub turn_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
}

/// A warning/critical pair for one metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

/// Threshold set for the five metrics the recovery tracker watches (spec
/// §4.10 fixes these exact starting values, mirroring the system's
/// `session_monitor` defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub context_tokens: Threshold,
    pub llm_latency: Threshold,
    pub first_chunk_latency: Threshold,
    pub retries_per_request: Threshold,
    pub memory_retrieval_count: Threshold,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            context_tokens: Threshold { warning: 8500.0, critical: 12000.0 },
            llm_latency: Threshold { warning: 5.0, critical: 8.0 },
            first_chunk_latency: Threshold { warning: 2.5, critical: 4.5 },
            retries_per_request: Threshold { warning: 1.0, critical: 3.0 },
            memory_retrieval_count: Threshold { warning: 2.0, critical: 5.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryState {
    Healthy,
    Degraded { healthy_streak: u32 },
}

/// Starts counting when any watched metric crosses its warning threshold;
/// declares recovery after three consecutive fully-healthy turns.
struct RecoveryTracker {
    state: RecoveryState,
}

impl RecoveryTracker {
    fn new() -> Self {
        Self { state: RecoveryState::Healthy }
    }

    /// Feed one turn's healthy/degraded verdict in; returns `true` exactly
    /// on the turn that completes recovery (the third consecutive healthy
    /// turn after a degradation).
    fn observe(&mut self, healthy: bool) -> bool {
        match (&mut self.state, healthy) {
            (RecoveryState::Healthy, true) => false,
            (RecoveryState::Healthy, false) => {
                self.state = RecoveryState::Degraded { healthy_streak: 0 };
                false
            }
            (RecoveryState::Degraded { .. }, false) => {
                self.state = RecoveryState::Degraded { healthy_streak: 0 };
                false
            }
            (RecoveryState::Degraded { healthy_streak }, true) => {
                *healthy_streak += 1;
                if *healthy_streak >= 3 {
                    self.state = RecoveryState::Healthy;
                    true
                } else {
                    false
                }
            }
        }
    }
}

struct CollectorState {
    history: Vec<RequestMetrics>,
    tracker: RecoveryTracker,
    turn_number: u64,
}

/// One logical owner per active turn (not re-entrant across
/// turns). Holds the turn history, threshold set, and recovery tracker.
pub struct MetricsCollector {
    thresholds: Thresholds,
    state: Mutex<CollectorState>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl MetricsCollector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: Mutex::new(CollectorState {
                history: Vec::new(),
                tracker: RecoveryTracker::new(),
                turn_number: 0,
            }),
        }
    }

    /// The next turn number to stamp on a [`RequestMetrics`] before
    /// recording it.
    pub fn next_turn_number(&self) -> u64 {
        self.state.lock().turn_number + 1
    }

    /// Append one turn's metrics to history, re-check thresholds (logging
    /// at warning/critical level), and update the recovery tracker. Returns
    /// `true` exactly on the turn that completes a recovery.
    pub fn record_metric(&self, metrics: RequestMetrics) -> bool {
        let breaches = self.check_thresholds(&metrics);
        for breach in &breaches {
            breach.log(&metrics);
        }
        let healthy = breaches.iter().all(|b| !b.is_warning_or_worse());

        let mut state = self.state.lock();
        state.turn_number = state.turn_number.max(metrics.turn_number);
        state.history.push(metrics);
        state.tracker.observe(healthy)
    }

    /// Evaluate the five watched metrics against [`Thresholds`].
    pub fn check_thresholds(&self, metrics: &RequestMetrics) -> Vec<ThresholdBreach> {
        let mut breaches = Vec::new();
        breaches.push(ThresholdBreach::evaluate(
            "context_size",
            metrics.context_size as f64,
            self.thresholds.context_tokens,
        ));
        breaches.push(ThresholdBreach::evaluate(
            "llm_latency",
            metrics.llm_latency,
            self.thresholds.llm_latency,
        ));
        breaches.push(ThresholdBreach::evaluate(
            "stream_first_chunk_latency",
            metrics.stream_first_chunk_latency,
            self.thresholds.first_chunk_latency,
        ));
        breaches.push(ThresholdBreach::evaluate(
            "retry_count",
            metrics.retry_count as f64,
            self.thresholds.retries_per_request,
        ));
        breaches.push(ThresholdBreach::evaluate(
            "memory_retrieval_count",
            metrics.memory_retrieval_count as f64,
            self.thresholds.memory_retrieval_count,
        ));
        breaches
    }

    pub fn history(&self) -> Vec<RequestMetrics> {
        self.state.lock().history.clone()
    }

    pub fn history_for(&self, experiment_id: &str, phase: Phase) -> Vec<RequestMetrics> {
        self.state
            .lock()
            .history
            .iter()
            .filter(|m| m.experiment_id.as_deref() == Some(experiment_id) && m.phase == Some(phase))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct ThresholdBreach {
    pub metric: &'static str,
    pub value: f64,
    pub severity: Severity,
}

impl ThresholdBreach {
    fn evaluate(metric: &'static str, value: f64, threshold: Threshold) -> Self {
        let severity = if value >= threshold.critical {
            Severity::Critical
        } else if value >= threshold.warning {
            Severity::Warning
        } else {
            Severity::Ok
        };
        Self { metric, value, severity }
    }

    fn is_warning_or_worse(&self) -> bool {
        self.severity != Severity::Ok
    }

    fn log(&self, metrics: &RequestMetrics) {
        match self.severity {
            Severity::Ok => {}
            Severity::Warning => tracing::warn!(
                metric = self.metric,
                value = self.value,
                turn_number = metrics.turn_number,
                "metric crossed warning threshold"
            ),
            Severity::Critical => tracing::error!(
                metric = self.metric,
                value = self.value,
                turn_number = metrics.turn_number,
                "metric crossed critical threshold"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_metrics(turn_number: u64) -> RequestMetrics {
        RequestMetrics { turn_number, ..Default::default() }
    }

    fn degraded_metrics(turn_number: u64) -> RequestMetrics {
        RequestMetrics { turn_number, llm_latency: 10.0, ..Default::default() }
    }

    #[test]
    fn healthy_turns_never_report_recovery() {
        let collector = MetricsCollector::default();
        assert!(!collector.record_metric(healthy_metrics(1)));
        assert!(!collector.record_metric(healthy_metrics(2)));
    }

    #[test]
    fn recovery_declared_after_three_consecutive_healthy_turns() {
        let collector = MetricsCollector::default();
        assert!(!collector.record_metric(degraded_metrics(1)));
        assert!(!collector.record_metric(healthy_metrics(2)));
        assert!(!collector.record_metric(healthy_metrics(3)));
        assert!(collector.record_metric(healthy_metrics(4)));
    }

    #[test]
    fn a_relapse_resets_the_healthy_streak() {
        let collector = MetricsCollector::default();
        collector.record_metric(degraded_metrics(1));
        collector.record_metric(healthy_metrics(2));
        collector.record_metric(healthy_metrics(3));
        collector.record_metric(degraded_metrics(4));
        assert!(!collector.record_metric(healthy_metrics(5)));
        assert!(!collector.record_metric(healthy_metrics(6)));
        assert!(collector.record_metric(healthy_metrics(7)));
    }

    #[test]
    fn threshold_breach_severity_escalates() {
        let collector = MetricsCollector::default();
        let metrics = RequestMetrics { llm_latency: 9.0, ..Default::default() };
        let breaches = collector.check_thresholds(&metrics);
        let latency_breach = breaches.iter().find(|b| b.metric == "llm_latency").unwrap();
        assert_eq!(latency_breach.severity, Severity::Critical);
    }

    #[test]
    fn history_filters_by_experiment_and_phase() {
        let collector = MetricsCollector::default();
        collector.record_metric(RequestMetrics {
            experiment_id: Some("exp-1".into()),
            phase: Some(Phase::Chaos),
            turn_number: 1,
            ..Default::default()
        });
        collector.record_metric(RequestMetrics {
            experiment_id: Some("exp-1".into()),
            phase: Some(Phase::Baseline),
            turn_number: 2,
            ..Default::default()
        });
        let chaos_only = collector.history_for("exp-1", Phase::Chaos);
        assert_eq!(chaos_only.len(), 1);
        assert_eq!(chaos_only[0].turn_number, 1);
    }
}
