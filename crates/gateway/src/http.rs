//! HTTP/WS surface (§6): the token/upload service's health endpoint, the
//! data-channel WS bridge a media-room participant's browser client speaks
//! to, and the chaos-experiment control endpoints the `chaos` CLI
//! subcommand drives remotely.
//!
//! The concrete media-room transport stays external (see `room.rs`); this
//! module only wires a participant's `user_id` to a [`BroadcastRoom`] and
//! a [`TurnOrchestrator`], and bridges both directions over a plain
//! websocket so the rest of the stack can be exercised without a vendor
//! SDK.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{json, Value};

use conductor_governance::UserRole;
use conductor_providers::ResilientTtsProxy;
use conductor_sessions::{Announcer, ConversationSession};

use crate::commands::CommandRouter;
use crate::orchestrator::TurnOrchestrator;
use crate::room::{BroadcastRoom, ChatEvent, RoomPublisher, SystemEvent};
use crate::state::AppState;

/// The session-scoped pieces a single `/ws/:user_id` connection shares
/// with any other connection for the same user: one room, one
/// orchestrator, one long-lived `ConversationSession`.
struct ConversationBundle {
    session: Arc<ConversationSession>,
    orchestrator: Arc<TurnOrchestrator>,
    room: Arc<BroadcastRoom>,
}

/// Speaks an announcement by publishing it onto the room's chat topic and
/// draining it through TTS. Deliberately independent of `TurnOrchestrator`
/// so `AppState::conversation_for` can hand this to `ConversationSession`
/// before the orchestrator for that user exists.
struct RoomAnnouncer {
    room: Arc<BroadcastRoom>,
    tts: Arc<ResilientTtsProxy>,
}

#[async_trait::async_trait]
impl Announcer for RoomAnnouncer {
    async fn speak(&self, text: &str) {
        self.room
            .publish_chat_event(ChatEvent::AssistantFinal {
                turn_id: "announcement".to_string(),
                content: text.to_string(),
                timestamp: crate::room::now_ms(),
            })
            .await;
        let mut frames = self.tts.synthesize(text).await;
        while frames.next().await.is_some() {}
    }
}

/// Wraps the process-wide [`AppState`] with the per-user bundles the WS
/// handler needs. Cheap to clone; shared across every connection.
#[derive(Clone)]
pub struct GatewayState {
    pub app: AppState,
    bundles: Arc<RwLock<HashMap<String, Arc<ConversationBundle>>>>,
    commands: Arc<CommandRouter>,
}

impl GatewayState {
    pub fn new(app: AppState) -> Self {
        Self {
            app,
            bundles: Arc::new(RwLock::new(HashMap::new())),
            commands: Arc::new(CommandRouter::new()),
        }
    }

    fn bundle_for(&self, user_id: &str) -> Arc<ConversationBundle> {
        if let Some(existing) = self.bundles.read().get(user_id) {
            return existing.clone();
        }
        let mut guard = self.bundles.write();
        guard
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let room = Arc::new(BroadcastRoom::default());
                let announcer: Arc<dyn Announcer> =
                    Arc::new(RoomAnnouncer { room: room.clone(), tts: self.app.tts.clone() });
                let session = self.app.conversation_for(user_id, announcer);
                let role = UserRole::parse(&self.app.config.governance.default_role).unwrap_or(UserRole::User);
                let orchestrator = TurnOrchestrator::new(self.app.clone(), user_id, role);
                Arc::new(ConversationBundle { session, orchestrator, room })
            })
            .clone()
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/:user_id", get(ws_upgrade))
        .route("/chaos", get(chaos_status))
        .route("/chaos/enable", post(chaos_enable))
        .route("/chaos/disable", post(chaos_disable))
        .with_state(state)
}

async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "active_conversations": state.app.active_conversation_count(),
    }))
}

async fn chaos_status(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(state.app.chaos.current())
}

async fn chaos_enable(State(state): State<GatewayState>, Json(config): Json<conductor_domain::config::ChaosConfig>) -> impl IntoResponse {
    state.app.chaos.enable_faults(config);
    Json(state.app.chaos.current())
}

async fn chaos_disable(State(state): State<GatewayState>) -> impl IntoResponse {
    state.app.chaos.disable_faults();
    Json(state.app.chaos.current())
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

/// Drives one participant connection: forwards the room's chat/system
/// broadcasts out over the socket, and routes inbound JSON frames to
/// either the turn orchestrator (final transcripts / typed chat text) or
/// the command router (`system.commands` envelopes).
async fn handle_socket(socket: WebSocket, user_id: String, state: GatewayState) {
    let bundle = state.bundle_for(&user_id);
    let (mut outbound, mut inbound) = socket.split();

    let mut chat_rx = bundle.room.subscribe_chat();
    let mut system_rx = bundle.room.subscribe_system();

    let forward_room = bundle.room.clone();
    let forward_task = tokio::spawn(async move {
        let _ = forward_room;
        loop {
            tokio::select! {
                chat = chat_rx.recv() => {
                    match chat {
                        Ok(event) => {
                            let Ok(text) = serde_json::to_string(&json!({"topic": "chat_events", "event": event})) else { continue };
                            if outbound.send(WsMessage::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                sys = system_rx.recv() => {
                    match sys {
                        Ok(event) => {
                            let Ok(text) = serde_json::to_string(&json!({"topic": "system.events", "event": event})) else { continue };
                            if outbound.send(WsMessage::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    while let Some(Ok(message)) = inbound.next().await {
        let WsMessage::Text(text) = message else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else { continue };
        route_inbound_frame(&frame, &bundle, &state).await;
    }

    forward_task.abort();
    bundle.session.detach_audio_session();
}

async fn route_inbound_frame(frame: &Value, bundle: &ConversationBundle, state: &GatewayState) {
    let topic = frame.get("topic").and_then(Value::as_str).unwrap_or("");
    match topic {
        "system.commands" => {
            let payload = frame.get("payload").cloned().unwrap_or(Value::Null);
            state.commands.handle(&payload, bundle.room.as_ref() as &dyn RoomPublisher).await;
        }
        _ => {
            let Some(text) = frame.get("text").and_then(Value::as_str) else { return };
            if let Err(e) = bundle.orchestrator.handle_user_message(text, bundle.room.as_ref() as &dyn RoomPublisher).await {
                tracing::error!(error = %e, user_id = %bundle.session.user_id, "turn handling failed");
                bundle
                    .room
                    .publish_system_event(SystemEvent::new(
                        "ERROR",
                        json!({ "message": "internal error handling turn" }),
                    ))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_zero_conversations_on_fresh_state() {
        let app = crate::state::test_support::build_test_state().await;
        let gateway = GatewayState::new(app);
        assert_eq!(gateway.app.active_conversation_count(), 0);
    }

    #[tokio::test]
    async fn bundle_for_same_user_id_is_reused() {
        let app = crate::state::test_support::build_test_state().await;
        let gateway = GatewayState::new(app);
        let a = gateway.bundle_for("u1");
        let b = gateway.bundle_for("u1");
        assert!(Arc::ptr_eq(&a.session, &b.session));
    }

    #[tokio::test]
    async fn chaos_enable_then_disable_round_trips_through_switchboard() {
        let app = crate::state::test_support::build_test_state().await;
        let mut cfg = conductor_domain::config::ChaosConfig::default();
        cfg.tool_failure_rate = 0.5;
        app.chaos.enable_faults(cfg);
        assert!(app.chaos.is_enabled());
        app.chaos.disable_faults();
        assert!(!app.chaos.is_enabled());
    }
}
