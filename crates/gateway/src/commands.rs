//! System command router (§6): structured `COMMAND` messages arriving on
//! `system.commands`, replied to on `system.events`.

use serde::Deserialize;
use serde_json::Value;

use crate::room::{RoomPublisher, SystemEvent};

#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    #[serde(rename = "type")]
    kind: String,
    action: String,
    #[serde(default)]
    payload: Value,
}

pub struct CommandRouter;

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        Self
    }

    /// Handles one inbound `system.commands` message. Anything that isn't
    /// a well-formed `COMMAND` envelope is silently dropped, matching the
    /// originating router's schema gate.
    pub async fn handle(&self, raw: &Value, room: &dyn RoomPublisher) {
        let Ok(envelope) = serde_json::from_value::<CommandEnvelope>(raw.clone()) else {
            return;
        };
        if envelope.kind != "COMMAND" {
            return;
        }

        tracing::info!(action = %envelope.action, "command received");

        match envelope.action.as_str() {
            "ping" => {
                let ts = envelope.payload.get("ts").cloned().unwrap_or(Value::Null);
                room.publish_system_event(SystemEvent::new("PONG", serde_json::json!({ "ts": ts }))).await;
            }
            "update_config" => {
                tracing::info!(payload = %envelope.payload, "config update requested");
                room.publish_system_event(SystemEvent::new(
                    "CONFIG_UPDATED",
                    serde_json::json!({ "processed": true }),
                ))
                .await;
            }
            "run_task" => {
                tracing::info!(payload = %envelope.payload, "task run requested");
                room.publish_system_event(SystemEvent::new(
                    "TASK_STARTED",
                    serde_json::json!({ "taskId": "temp-123", "status": "running" }),
                ))
                .await;
            }
            other => {
                tracing::warn!(action = %other, "unknown command action");
                room.publish_system_event(SystemEvent::new(
                    "ERROR",
                    serde_json::json!({ "message": format!("Unknown action: {other}") }),
                ))
                .await;
            }
        }
    }
}
