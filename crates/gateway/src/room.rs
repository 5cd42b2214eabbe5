//! Media-room event plumbing (§4.5, §6).
//!
//! The concrete media-room transport (the wire protocol a participant's
//! client actually speaks) is an explicit external collaborator — this
//! module only fixes the *shape* of what the orchestrator publishes and
//! the trait boundary a real transport would implement. `BroadcastRoom`
//! is the in-process reference implementation: it fans events out over a
//! `tokio::sync::broadcast` channel, which is enough to drive the HTTP
//! surface (e.g. an SSE/WS bridge) without pulling in a vendor SDK.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// `chat_events` topic payloads (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    UserMessage {
        turn_id: String,
        content: String,
        timestamp: i64,
    },
    AssistantDelta {
        turn_id: String,
        content: String,
        seq: u64,
        timestamp: i64,
    },
    AssistantFinal {
        turn_id: String,
        content: String,
        timestamp: i64,
    },
    ToolExecution {
        turn_id: String,
        tool: String,
        status: ToolExecutionStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolExecutionStatus {
    Started,
    Finished,
}

/// `system.events` topic envelope (§6). `category` is one of
/// `PONG`/`CONFIG_UPDATED`/`TASK_STARTED`/`ERROR`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: &'static str,
    pub category: String,
    pub payload: Value,
}

impl SystemEvent {
    pub fn new(category: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: "EVENT",
            source: "agent",
            category: category.into(),
            payload,
        }
    }
}

/// Publishes structured events onto the room's data channel. Implemented
/// by the real transport; `BroadcastRoom` below is the in-process stand-in
/// used when no such transport is wired up.
#[async_trait::async_trait]
pub trait RoomPublisher: Send + Sync {
    async fn publish_chat_event(&self, event: ChatEvent);
    async fn publish_system_event(&self, event: SystemEvent);
}

/// In-process fan-out over broadcast channels. Cloning is cheap; every
/// clone observes the same pair of channels.
#[derive(Clone)]
pub struct BroadcastRoom {
    chat_tx: broadcast::Sender<ChatEvent>,
    system_tx: broadcast::Sender<SystemEvent>,
}

impl Default for BroadcastRoom {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BroadcastRoom {
    pub fn new(capacity: usize) -> Self {
        let (chat_tx, _) = broadcast::channel(capacity);
        let (system_tx, _) = broadcast::channel(capacity);
        Self { chat_tx, system_tx }
    }

    pub fn subscribe_chat(&self) -> broadcast::Receiver<ChatEvent> {
        self.chat_tx.subscribe()
    }

    pub fn subscribe_system(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_tx.subscribe()
    }
}

#[async_trait::async_trait]
impl RoomPublisher for BroadcastRoom {
    async fn publish_chat_event(&self, event: ChatEvent) {
        // No subscribers is not an error — the UI may not be connected yet.
        let _ = self.chat_tx.send(event);
    }

    async fn publish_system_event(&self, event: SystemEvent) {
        let _ = self.system_tx.send(event);
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convenience alias for the shared handle stored on `AppState`.
pub type SharedRoom = Arc<dyn RoomPublisher>;
