//! Chaos experiment reports: when an
//! experiment concludes (or is torn down by a guardrail), a report is
//! assembled from the turn history and written to
//! `chaos/reports/<experiment_id>_<timestamp>.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metrics::{Phase, RequestMetrics};

/// Aggregate metrics over the turns tagged with one phase of an
/// experiment. `llm_latency` is the degradation signal (§9 open question:
/// the originating report emitter aggregates on latency as the primary
/// indicator of service quality).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhaseSummary {
    pub turn_count: usize,
    pub avg_llm_latency: f64,
    pub avg_first_chunk_latency: f64,
    pub avg_context_size: f64,
    pub total_probe_failures: u32,
    pub total_reconnect_attempts: u32,
}

impl PhaseSummary {
    fn from_turns(turns: &[RequestMetrics]) -> Self {
        if turns.is_empty() {
            return Self::default();
        }
        let n = turns.len() as f64;
        Self {
            turn_count: turns.len(),
            avg_llm_latency: turns.iter().map(|t| t.llm_latency).sum::<f64>() / n,
            avg_first_chunk_latency: turns.iter().map(|t| t.stream_first_chunk_latency).sum::<f64>() / n,
            avg_context_size: turns.iter().map(|t| t.context_size as f64).sum::<f64>() / n,
            total_probe_failures: turns.iter().map(|t| t.probe_failures).sum(),
            total_reconnect_attempts: turns.iter().map(|t| t.reconnect_attempts).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationAnalysis {
    pub baseline_avg: f64,
    pub chaos_avg: f64,
    pub recovery_avg: f64,
    pub degradation_factor: f64,
    pub recovery_turn: Option<u64>,
    pub recovered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosExperimentReport {
    pub experiment_id: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub baseline: PhaseSummary,
    pub chaos: PhaseSummary,
    pub recovery: PhaseSummary,
    pub degradation: DegradationAnalysis,
}

impl ChaosExperimentReport {
    /// Build a report from a turn history already filtered to a single
    /// `experiment_id`, using `started_at`/`finished_at` as recorded by the
    /// caller (telemetry itself has no wall-clock access per the scripting
    /// constraint this workspace's chaos tooling shares).
    pub fn build(
        experiment_id: impl Into<String>,
        started_at: chrono::DateTime<chrono::Utc>,
        finished_at: chrono::DateTime<chrono::Utc>,
        turns: &[RequestMetrics],
    ) -> Self {
        let baseline_turns: Vec<_> = turns
            .iter()
            .filter(|t| t.phase == Some(Phase::Baseline))
            .cloned()
            .collect();
        let chaos_turns: Vec<_> = turns
            .iter()
            .filter(|t| t.phase == Some(Phase::Chaos))
            .cloned()
            .collect();
        let recovery_turns: Vec<_> = turns
            .iter()
            .filter(|t| t.phase == Some(Phase::Recovery))
            .cloned()
            .collect();

        let baseline = PhaseSummary::from_turns(&baseline_turns);
        let chaos = PhaseSummary::from_turns(&chaos_turns);
        let recovery = PhaseSummary::from_turns(&recovery_turns);

        let degradation_factor = if baseline.avg_llm_latency > 0.0 {
            chaos.avg_llm_latency / baseline.avg_llm_latency
        } else {
            0.0
        };

        let recovery_turn = recovery_turns.first().map(|t| t.turn_number);
        let recovered = !recovery_turns.is_empty()
            && recovery.avg_llm_latency <= baseline.avg_llm_latency * 1.2;

        Self {
            experiment_id: experiment_id.into(),
            started_at,
            finished_at,
            baseline,
            chaos,
            recovery,
            degradation: DegradationAnalysis {
                baseline_avg: baseline.avg_llm_latency,
                chaos_avg: chaos.avg_llm_latency,
                recovery_avg: recovery.avg_llm_latency,
                degradation_factor,
                recovery_turn,
                recovered,
            },
        }
    }

    /// The canonical path this report is written to: `chaos/reports/
    /// <experiment_id>_<timestamp>.json`, relative to `reports_dir`.
    pub fn report_path(&self, reports_dir: &Path) -> PathBuf {
        let ts = self.finished_at.format("%Y%m%dT%H%M%SZ");
        reports_dir.join(format!("{}_{}.json", self.experiment_id, ts))
    }

    /// Serialize and write this report to disk, creating `reports_dir` if
    /// needed. Synchronous — callers on an async runtime should wrap this
    /// in `spawn_blocking`.
    pub fn write_to(&self, reports_dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(reports_dir)?;
        let path = self.report_path(reports_dir);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metric(phase: Phase, latency: f64, turn: u64) -> RequestMetrics {
        RequestMetrics {
            phase: Some(phase),
            llm_latency: latency,
            turn_number: turn,
            experiment_id: Some("exp-1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn degradation_factor_computed_from_latency_averages() {
        let turns = vec![
            metric(Phase::Baseline, 1.0, 1),
            metric(Phase::Baseline, 1.0, 2),
            metric(Phase::Chaos, 4.0, 3),
            metric(Phase::Recovery, 1.1, 4),
            metric(Phase::Recovery, 1.1, 5),
            metric(Phase::Recovery, 1.1, 6),
        ];
        let t0 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 5, 0).unwrap();
        let report = ChaosExperimentReport::build("exp-1", t0, t1, &turns);
        assert_eq!(report.degradation.degradation_factor, 4.0);
        assert!(report.degradation.recovered);
        assert_eq!(report.degradation.recovery_turn, Some(4));
    }

    #[test]
    fn report_path_includes_experiment_id() {
        let t0 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let report = ChaosExperimentReport::build("exp-42", t0, t0, &[]);
        let path = report.report_path(Path::new("chaos/reports"));
        assert!(path.to_string_lossy().contains("exp-42"));
    }

    #[test]
    fn empty_phase_yields_zeroed_summary() {
        let t0 = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let report = ChaosExperimentReport::build("exp-1", t0, t0, &[]);
        assert_eq!(report.baseline.turn_count, 0);
        assert_eq!(report.degradation.degradation_factor, 0.0);
        assert!(!report.degradation.recovered);
    }
}
