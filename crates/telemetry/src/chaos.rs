//! Chaos switchboard: a process-wide, read-mostly config that
//! every layer — Smart LLM, tool executor, memory manager — consults on
//! each relevant call and applies probabilistically. Mutated only by the
//! experiment runner or the config/env loader at startup.

use std::sync::Arc;
use std::time::Duration;

use conductor_domain::config::ChaosConfig;
use parking_lot::RwLock;
use rand::Rng;

/// Shared handle to the process-wide chaos config. Cloning is cheap (an
/// `Arc` bump); every clone observes the same underlying switchboard.
#[derive(Clone)]
pub struct ChaosSwitchboard {
    inner: Arc<RwLock<ChaosConfig>>,
}

impl Default for ChaosSwitchboard {
    fn default() -> Self {
        Self::new(ChaosConfig::default())
    }
}

impl ChaosSwitchboard {
    pub fn new(config: ChaosConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Snapshot the current config.
    pub fn current(&self) -> ChaosConfig {
        self.inner.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    /// Install a new chaos config wholesale (the experiment runner calling
    /// `enable_faults`).
    pub fn enable_faults(&self, mut config: ChaosConfig) {
        config.enabled = true;
        tracing::info!(
            experiment_id = ?config.experiment_id,
            experiment_type = ?config.experiment_type,
            "chaos faults enabled"
        );
        *self.inner.write() = config;
    }

    /// Reset every numeric knob to its default (fixes the unreset-knob gap
    /// documented in DESIGN.md: `rate_limit_probability` and
    /// `persistence_failure_rate` are reset here too).
    pub fn disable_faults(&self) {
        let mut guard = self.inner.write();
        guard.disable();
        tracing::info!("chaos faults disabled");
    }

    /// LLM latency injection (§4.10): sleep drawn uniformly from
    /// `[0.5, 2.0] * (multiplier - 1)` seconds before the underlying LLM
    /// call, when `multiplier > 1`.
    pub fn llm_latency_delay(&self) -> Option<Duration> {
        let multiplier = self.inner.read().llm_latency_multiplier;
        if multiplier <= 1.0 {
            return None;
        }
        let base = multiplier - 1.0;
        let factor = rand::thread_rng().gen_range(0.5..=2.0);
        let secs = base * factor;
        if secs <= 0.0 {
            None
        } else {
            Some(Duration::from_secs_f64(secs))
        }
    }

    /// Whether this call should be failed as a simulated 429 rate limit.
    pub fn should_rate_limit(&self) -> bool {
        probability_hit(self.inner.read().rate_limit_probability)
    }

    /// Whether this LLM call should be failed as a simulated 500. Evaluated
    /// independently of `should_rate_limit` (a separate coin flip at the
    /// same `rate_limit_probability`) so a single knob still drives both
    /// failure shapes on the LLM path without reusing `tool_failure_rate`,
    /// which the originating implementation conflated into this path — see
    /// DESIGN.md.
    pub fn should_fail_llm_request(&self) -> bool {
        probability_hit(self.inner.read().rate_limit_probability)
    }

    /// Whether this tool execution should be failed as a simulated error.
    /// Scoped to the tool executor only (§4.10 resolves the conflation in
    /// the originating implementation — see DESIGN.md).
    pub fn should_fail_tool(&self) -> bool {
        probability_hit(self.inner.read().tool_failure_rate)
    }

    /// Whether this memory read/write should be failed as a simulated
    /// persistence error.
    pub fn should_fail_persistence(&self) -> bool {
        probability_hit(self.inner.read().persistence_failure_rate)
    }

    /// Duplicate retrieved memory items (tagged `" (INFLATED)"`) until the
    /// inflation factor's target count is reached, to stress context size.
    pub fn inflate_memories<T: Clone>(&self, items: Vec<T>, tag: impl Fn(T) -> T) -> Vec<T> {
        let factor = self.inner.read().memory_inflation_factor;
        if factor <= 1.0 || items.is_empty() {
            return items;
        }
        let target = ((items.len() as f64) * factor).round() as usize;
        let mut out = items.clone();
        let mut i = 0;
        while out.len() < target {
            let dup = tag(items[i % items.len()].clone());
            out.push(dup);
            i += 1;
        }
        out
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.inner.read().max_consecutive_failures
    }
}

fn probability_hit(p: f64) -> bool {
    if p <= 0.0 {
        return false;
    }
    if p >= 1.0 {
        return true;
    }
    rand::thread_rng().gen_bool(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_never_fires() {
        let board = ChaosSwitchboard::default();
        assert!(!board.is_enabled());
        assert!(board.llm_latency_delay().is_none());
        assert!(!board.should_rate_limit());
        assert!(!board.should_fail_tool());
        assert!(!board.should_fail_persistence());
    }

    #[test]
    fn probability_one_always_hits() {
        let mut cfg = ChaosConfig::default();
        cfg.tool_failure_rate = 1.0;
        let board = ChaosSwitchboard::new(cfg);
        assert!(board.should_fail_tool());
    }

    #[test]
    fn probability_zero_never_hits() {
        let mut cfg = ChaosConfig::default();
        cfg.rate_limit_probability = 0.0;
        let board = ChaosSwitchboard::new(cfg);
        assert!(!board.should_rate_limit());
    }

    #[test]
    fn latency_multiplier_of_one_injects_nothing() {
        let board = ChaosSwitchboard::default();
        assert!(board.llm_latency_delay().is_none());
    }

    #[test]
    fn latency_multiplier_above_one_injects_delay() {
        let mut cfg = ChaosConfig::default();
        cfg.llm_latency_multiplier = 3.0;
        let board = ChaosSwitchboard::new(cfg);
        assert!(board.llm_latency_delay().is_some());
    }

    #[test]
    fn disable_resets_rate_limit_and_persistence_knobs() {
        let mut cfg = ChaosConfig::default();
        cfg.rate_limit_probability = 0.5;
        cfg.persistence_failure_rate = 0.5;
        let board = ChaosSwitchboard::new(cfg);
        board.disable_faults();
        let snapshot = board.current();
        assert_eq!(snapshot.rate_limit_probability, 0.0);
        assert_eq!(snapshot.persistence_failure_rate, 0.0);
        assert!(!snapshot.enabled);
    }

    #[test]
    fn inflate_memories_duplicates_to_target_count() {
        let mut cfg = ChaosConfig::default();
        cfg.memory_inflation_factor = 2.0;
        let board = ChaosSwitchboard::new(cfg);
        let items = vec!["a".to_string(), "b".to_string()];
        let inflated = board.inflate_memories(items, |s| format!("{s} (INFLATED)"));
        assert_eq!(inflated.len(), 4);
        assert!(inflated[2].ends_with("(INFLATED)"));
    }

    #[test]
    fn inflate_memories_noop_below_threshold() {
        let board = ChaosSwitchboard::default();
        let items = vec![1, 2, 3];
        let out = board.inflate_memories(items.clone(), |x| x);
        assert_eq!(out, items);
    }
}
