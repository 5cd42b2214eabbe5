//! Governed tool executor: checks the `ExecutionGate` before
//! invoking a tool, emits the three-stage audit trail, and applies the
//! chaos `tool_failure_rate` knob — scoped to this executor only (see
//! DESIGN.md for the conflation this separates from the LLM call path).

use std::collections::HashMap;
use std::sync::Arc;

use conductor_domain::error::{Error, Result};
use conductor_governance::{AuditLog, ExecutionGate, UserRole};
use conductor_telemetry::ChaosSwitchboard;
use serde_json::Value;

use crate::catalog::Tool;

pub struct GovernedExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    gate: ExecutionGate,
    audit: AuditLog,
    chaos: Arc<ChaosSwitchboard>,
}

impl GovernedExecutor {
    pub fn new(tools: HashMap<String, Arc<dyn Tool>>, gate: ExecutionGate, chaos: Arc<ChaosSwitchboard>) -> Self {
        Self { tools, gate, audit: AuditLog::new(), chaos }
    }

    /// Runs the admission check, then (if allowed) the tool itself,
    /// recording the full attempt/blocked/result audit trail under one
    /// trace id.
    pub async fn execute(&self, tool_name: &str, args: Value, user_id: &str, role: UserRole) -> Result<Value> {
        let trace_id = AuditLog::new_trace_id();
        self.audit.attempt(&trace_id, tool_name, user_id, role.as_str());

        let decision = self.gate.evaluate(tool_name, role);
        if let conductor_governance::GateDecision::Denied { reason } = decision {
            let risk = conductor_governance::RiskPolicy::default_policy().risk(tool_name);
            self.audit.blocked(&trace_id, tool_name, user_id, role.as_str(), &risk.to_string(), &reason);
            return Err(Error::Other(reason));
        }

        let Some(tool) = self.tools.get(tool_name) else {
            let error = format!("unknown tool '{tool_name}'");
            self.audit.result(&trace_id, tool_name, user_id, role.as_str(), false, Some(&error));
            return Err(Error::Other(error));
        };

        if self.chaos.should_fail_tool() {
            let error = format!("tool '{tool_name}' failed (Simulated Chaos)");
            self.audit.result(&trace_id, tool_name, user_id, role.as_str(), false, Some(&error));
            return Err(Error::Other(error));
        }

        match tool.execute(args).await {
            Ok(value) => {
                self.audit.result(&trace_id, tool_name, user_id, role.as_str(), true, None);
                Ok(value)
            }
            Err(e) => {
                self.audit.result(&trace_id, tool_name, user_id, role.as_str(), false, Some(&e.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use conductor_domain::config::ChaosConfig;
    use conductor_governance::RiskPolicy;
    use serde_json::json;

    fn executor(chaos: ChaosConfig) -> GovernedExecutor {
        GovernedExecutor::new(
            default_catalog(),
            ExecutionGate::new(RiskPolicy::default_policy()),
            Arc::new(ChaosSwitchboard::new(chaos)),
        )
    }

    #[tokio::test]
    async fn s1_admin_set_alarm_succeeds() {
        let exec = executor(ChaosConfig::default());
        let result = exec
            .execute("set_alarm", json!({ "time": "07:00" }), "u1", UserRole::Admin)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn s2_guest_send_email_denied_with_exact_message() {
        let exec = executor(ChaosConfig::default());
        let err = exec
            .execute("send_email", json!({ "recipient": "a@b.com" }), "u1", UserRole::Guest)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "⛔ Permission Denied: 'send_email' is classified as HIGH risk. Your role (GUEST) only allows up to LOW risk."
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let exec = executor(ChaosConfig::default());
        let err = exec.execute("not_a_tool", json!({}), "u1", UserRole::Admin).await.unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[tokio::test]
    async fn chaos_tool_failure_rate_forces_simulated_failure() {
        let mut cfg = ChaosConfig::default();
        cfg.tool_failure_rate = 1.0;
        let exec = executor(cfg);
        let err = exec
            .execute("get_current_datetime", json!({}), "u1", UserRole::Guest)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Simulated Chaos"));
    }
}
