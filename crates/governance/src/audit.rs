use serde::Serialize;
use uuid::Uuid;

/// Marker for which phase of a tool execution an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Attempt,
    Blocked,
    Result,
}

/// A single audit record. One tool execution produces an `Attempt` record,
/// followed by either exactly one `Blocked` record (and no `Result`) or
/// exactly one `Result` record, all sharing the same `trace_id`.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub trace_id: String,
    pub stage: AuditStage,
    pub tool_name: String,
    pub user_id: String,
    pub role: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(target: "audit", audit_record = %json, "audit"),
            Err(e) => tracing::error!(target: "audit", error = %e, "failed to serialize audit record"),
        }
    }
}

/// Emits the three-record audit trail for governed tool executions
/// (JSON lines to the `audit` logger, one record per attempt, one
/// per block if any, one per result, all sharing a trace id).
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditLog;

impl AuditLog {
    pub fn new() -> Self {
        Self
    }

    /// Start a new trace for one tool execution, returning the trace id the
    /// caller must thread through the rest of the call's audit records.
    pub fn new_trace_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn attempt(&self, trace_id: &str, tool_name: &str, user_id: &str, role: &str) {
        AuditRecord {
            trace_id: trace_id.to_string(),
            stage: AuditStage::Attempt,
            tool_name: tool_name.to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            timestamp: chrono::Utc::now(),
            risk: None,
            reason: None,
            success: None,
            error: None,
        }
        .emit();
    }

    pub fn blocked(
        &self,
        trace_id: &str,
        tool_name: &str,
        user_id: &str,
        role: &str,
        risk: &str,
        reason: &str,
    ) {
        AuditRecord {
            trace_id: trace_id.to_string(),
            stage: AuditStage::Blocked,
            tool_name: tool_name.to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            timestamp: chrono::Utc::now(),
            risk: Some(risk.to_string()),
            reason: Some(reason.to_string()),
            success: None,
            error: None,
        }
        .emit();
    }

    pub fn result(
        &self,
        trace_id: &str,
        tool_name: &str,
        user_id: &str,
        role: &str,
        success: bool,
        error: Option<&str>,
    ) {
        AuditRecord {
            trace_id: trace_id.to_string(),
            stage: AuditStage::Result,
            tool_name: tool_name.to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            timestamp: chrono::Utc::now(),
            risk: None,
            reason: None,
            success: Some(success),
            error: error.map(|e| e.to_string()),
        }
        .emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        let a = AuditLog::new_trace_id();
        let b = AuditLog::new_trace_id();
        assert_ne!(a, b);
    }

    #[test]
    fn record_serializes_without_panicking() {
        let record = AuditRecord {
            trace_id: "t-1".into(),
            stage: AuditStage::Blocked,
            tool_name: "send_email".into(),
            user_id: "u-1".into(),
            role: "GUEST".into(),
            timestamp: chrono::Utc::now(),
            risk: Some("HIGH".into()),
            reason: Some("denied".into()),
            success: None,
            error: None,
        };
        let json = serde_json::to_string(&record).expect("serializes");
        assert!(json.contains("\"blocked\""));
        assert!(json.contains("send_email"));
    }
}
