//! Hard per-session limits. Each check returns `false` and
//! latches `emergency_stop` when its limit is breached; callers must honour
//! the emergency stop and tear the experiment down rather than start
//! another turn.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardrailLimits {
    pub max_tokens_per_session: u64,
    pub max_retries_per_request: u32,
    pub max_session_duration_seconds: u64,
    pub max_consecutive_failures: u32,
}

impl Default for GuardrailLimits {
    fn default() -> Self {
        Self {
            max_tokens_per_session: 200_000,
            max_retries_per_request: 3,
            max_session_duration_seconds: 3_600,
            max_consecutive_failures: 3,
        }
    }
}

struct GuardrailState {
    tokens_used: u64,
    consecutive_failures: u32,
    started_at: Instant,
    emergency_stop: bool,
}

/// Tracks one session against [`GuardrailLimits`]. Every check is a
/// boolean: `true` means the session may keep going, `false` means a limit
/// was just breached and `emergency_stop` has latched.
pub struct Guardrails {
    limits: GuardrailLimits,
    state: Mutex<GuardrailState>,
}

impl Guardrails {
    pub fn new(limits: GuardrailLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(GuardrailState {
                tokens_used: 0,
                consecutive_failures: 0,
                started_at: Instant::now(),
                emergency_stop: false,
            }),
        }
    }

    pub fn emergency_stop(&self) -> bool {
        self.state.lock().emergency_stop
    }

    /// Record token usage for this session; returns `false` (and latches
    /// the stop) if the session's cumulative usage now exceeds the limit.
    pub fn check_tokens(&self, additional: u64) -> bool {
        let mut state = self.state.lock();
        state.tokens_used += additional;
        if state.tokens_used > self.limits.max_tokens_per_session {
            state.emergency_stop = true;
            tracing::warn!(
                tokens_used = state.tokens_used,
                limit = self.limits.max_tokens_per_session,
                "guardrail tripped: max_tokens_per_session exceeded"
            );
            return false;
        }
        true
    }

    /// A single request's retry count against `max_retries_per_request`.
    /// This does not latch `emergency_stop` on its own — a request-scoped
    /// breach is retried/abandoned by the caller, not fatal to the session.
    pub fn check_retries(&self, retries: u32) -> bool {
        if retries > self.limits.max_retries_per_request {
            tracing::warn!(
                retries,
                limit = self.limits.max_retries_per_request,
                "guardrail tripped: max_retries_per_request exceeded"
            );
            return false;
        }
        true
    }

    /// Whether the session has run past its allotted duration.
    pub fn check_duration(&self) -> bool {
        let mut state = self.state.lock();
        let elapsed = state.started_at.elapsed();
        if elapsed > Duration::from_secs(self.limits.max_session_duration_seconds) {
            state.emergency_stop = true;
            tracing::warn!(
                elapsed_secs = elapsed.as_secs(),
                limit = self.limits.max_session_duration_seconds,
                "guardrail tripped: max_session_duration_seconds exceeded"
            );
            return false;
        }
        true
    }

    /// Record the outcome of a tool execution (or any session-critical
    /// operation); returns `false` once `max_consecutive_failures`
    /// consecutive failures have been observed.
    pub fn record_outcome(&self, success: bool) -> bool {
        let mut state = self.state.lock();
        if success {
            state.consecutive_failures = 0;
            return true;
        }
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.limits.max_consecutive_failures {
            state.emergency_stop = true;
            tracing::warn!(
                consecutive_failures = state.consecutive_failures,
                limit = self.limits.max_consecutive_failures,
                "guardrail tripped: max_consecutive_failures exceeded"
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_under_limit_is_fine() {
        let g = Guardrails::new(GuardrailLimits { max_tokens_per_session: 1000, ..Default::default() });
        assert!(g.check_tokens(500));
        assert!(!g.emergency_stop());
    }

    #[test]
    fn tokens_over_limit_trips_emergency_stop() {
        let g = Guardrails::new(GuardrailLimits { max_tokens_per_session: 1000, ..Default::default() });
        assert!(g.check_tokens(500));
        assert!(!g.check_tokens(600));
        assert!(g.emergency_stop());
    }

    #[test]
    fn s8_three_consecutive_failures_trips_stop() {
        let g = Guardrails::new(GuardrailLimits { max_consecutive_failures: 3, ..Default::default() });
        assert!(g.record_outcome(false));
        assert!(g.record_outcome(false));
        assert!(!g.record_outcome(false));
        assert!(g.emergency_stop());
    }

    #[test]
    fn a_success_resets_the_failure_streak() {
        let g = Guardrails::new(GuardrailLimits { max_consecutive_failures: 3, ..Default::default() });
        assert!(g.record_outcome(false));
        assert!(g.record_outcome(false));
        assert!(g.record_outcome(true));
        assert!(g.record_outcome(false));
        assert!(g.record_outcome(false));
        assert!(!g.emergency_stop());
    }

    #[test]
    fn retries_over_limit_fails_check_without_latching_stop() {
        let g = Guardrails::new(GuardrailLimits { max_retries_per_request: 2, ..Default::default() });
        assert!(!g.check_retries(3));
        assert!(!g.emergency_stop());
    }
}
