//! Turn Orchestrator (§4.5): receives final transcripts and typed chat
//! messages, drives intent classification, the governance-gated tool
//! path, and LLM streaming, publishing UI events in strict order for each
//! `turn_id`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use conductor_domain::error::Result;
use conductor_domain::stream::StreamEvent;
use conductor_domain::tool::{Message, Role, ToolDefinition};
use conductor_governance::UserRole;
use conductor_intent::Intent;
use conductor_providers::ContextBuilder;

use crate::room::{ChatEvent, RoomPublisher, ToolExecutionStatus};
use crate::state::AppState;

const BASE_SYSTEM_PROMPT: &str =
    "You are a helpful, concise voice assistant. Speak naturally, as if replying out loud.";

const CLARIFICATION_TEMPLATES: &[&str] = &[
    "I'd be happy to help! Could you tell me more about what you'd like to do?",
    "I want to make sure I understand. What would you like me to help with?",
    "Could you give me a bit more detail about what you're looking for?",
];

const MODE_SWITCH_DIRECT: &str = "switch to direct mode";
const MODE_SWITCH_SAFE: &str = "switch to safe mode";

/// Agent operating mode, toggled by the mode-switch phrases (§4.5 step 4).
/// `Direct` currently routes identically to `Safe` — both still go through
/// the same governance gate — but is tracked so a future direct-execution
/// fast path has somewhere to hang its check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Safe,
    Direct,
}

/// Per-user turn-driving state: owns the persisted chat history and the
/// rotating clarification index, and is the single place that calls into
/// classification, governance, memory, and the LLM for one conversation.
pub struct TurnOrchestrator {
    state: AppState,
    user_id: String,
    role: UserRole,
    mode: RwLock<AgentMode>,
    chat_ctx: RwLock<Vec<Message>>,
    clarification_index: AtomicUsize,
    turn_counter: AtomicU64,
}

impl TurnOrchestrator {
    pub fn new(state: AppState, user_id: impl Into<String>, role: UserRole) -> Arc<Self> {
        Arc::new(Self {
            state,
            user_id: user_id.into(),
            role,
            mode: RwLock::new(AgentMode::Safe),
            chat_ctx: RwLock::new(Vec::new()),
            clarification_index: AtomicUsize::new(0),
            turn_counter: AtomicU64::new(0),
        })
    }

    pub fn mode(&self) -> AgentMode {
        *self.mode.read()
    }

    /// Drives one complete turn for a final transcript or a typed chat
    /// message (§4.5's two triggers for opening a turn are handled
    /// identically once the text is in hand).
    pub async fn handle_user_message(&self, text: &str, room: &dyn RoomPublisher) -> Result<()> {
        if self.state.guardrails.emergency_stop() {
            tracing::warn!(user_id = %self.user_id, "emergency stop latched, dropping turn");
            return Ok(());
        }

        let turn_id = Uuid::new_v4().to_string();
        let mut delta_seq: u64 = 0;

        room.publish_chat_event(ChatEvent::UserMessage {
            turn_id: turn_id.clone(),
            content: text.to_string(),
            timestamp: crate::room::now_ms(),
        })
        .await;

        self.chat_ctx.write().push(Message::user(text));

        // Step 4: mode-switch phrases short-circuit everything else.
        let lowered = text.to_lowercase();
        if lowered.contains(MODE_SWITCH_DIRECT) {
            *self.mode.write() = AgentMode::Direct;
            let reply = "I have switched to Direct Mode.";
            self.finish_with_verbatim_reply(&turn_id, reply, room).await;
            return Ok(());
        }
        if lowered.contains(MODE_SWITCH_SAFE) {
            *self.mode.write() = AgentMode::Safe;
            let reply = "I have switched back to Safe Mode.";
            self.finish_with_verbatim_reply(&turn_id, reply, room).await;
            return Ok(());
        }

        let memory_context = self.gather_memory_context().await;
        let memory_ctx_ref = if memory_context.trim().is_empty() { None } else { Some(memory_context.as_str()) };
        let intent = self.state.classifier.classify(text, memory_ctx_ref, &self.state.tool_registry);

        let mut system_extras: Vec<String> = Vec::new();
        if let Some(ctx) = memory_ctx_ref {
            system_extras.push(ctx.to_string());
        }

        let mut verbatim_reply: Option<String> = None;

        match &intent {
            Intent::ToolAction { tool_name, params, .. } => {
                if let Some(reply) = self
                    .handle_tool_action(tool_name, params, &turn_id, room, &mut system_extras)
                    .await
                {
                    verbatim_reply = Some(reply);
                }
            }
            Intent::MemoryQuery { .. } => {
                if let Some(name) = extract_name_from_memory(&memory_context) {
                    verbatim_reply = Some(format!("Your name is {name}."));
                }
            }
            Intent::Clarification { .. } => {
                let idx = self.clarification_index.fetch_add(1, Ordering::SeqCst) % CLARIFICATION_TEMPLATES.len();
                verbatim_reply = Some(CLARIFICATION_TEMPLATES[idx].to_string());
            }
            Intent::Conversation { .. } => {}
        }

        if let Some(reply) = verbatim_reply {
            self.finish_with_verbatim_reply(&turn_id, &reply, room).await;
            return Ok(());
        }

        self.stream_llm_reply(&turn_id, &mut delta_seq, system_extras, room).await
    }

    /// Handles a `TOOL_ACTION` intent. Returns `Some(reply)` when the turn
    /// is fully handled without the LLM (missing params, tool failure);
    /// on success, pushes a "phrase this naturally" note into
    /// `system_extras` and returns `None` so the caller falls through to
    /// step 7.
    async fn handle_tool_action(
        &self,
        tool_name: &str,
        params: &std::collections::HashMap<String, Value>,
        turn_id: &str,
        room: &dyn RoomPublisher,
        system_extras: &mut Vec<String>,
    ) -> Option<String> {
        let Some(metadata) = self.state.tool_registry.get(tool_name) else {
            return None;
        };

        let missing: Vec<&String> = metadata.required_params.iter().filter(|p| !params.contains_key(p.as_str())).collect();
        if let Some(first_missing) = missing.first() {
            return Some(format!("I need a bit more info. What's the {}?", first_missing.replace('_', " ")));
        }

        let args = Value::Object(params.iter().map(|(k, v)| (k.clone(), v.clone())).collect());

        room.publish_chat_event(ChatEvent::ToolExecution {
            turn_id: turn_id.to_string(),
            tool: tool_name.to_string(),
            status: ToolExecutionStatus::Started,
        })
        .await;

        let outcome = self.state.executor.execute(tool_name, args, &self.user_id, self.role).await;

        room.publish_chat_event(ChatEvent::ToolExecution {
            turn_id: turn_id.to_string(),
            tool: tool_name.to_string(),
            status: ToolExecutionStatus::Finished,
        })
        .await;

        match outcome {
            Ok(result) => {
                self.state.guardrails.record_outcome(true);
                system_extras.push(format!("Tool Result: {result}. Phrase this naturally."));
                None
            }
            Err(e) => {
                self.state.guardrails.record_outcome(false);
                let message = e.to_string();
                // A governance denial is not an error (§7): the gate's exact
                // wording is the user-facing reply, returned verbatim.
                if message.starts_with('\u{26d4}') {
                    return Some(message);
                }
                let lower = message.to_lowercase();
                let friendly = if lower.contains("missing") && lower.contains("argument") {
                    "I seem to be missing some details to complete that request. Could you be more specific?"
                } else {
                    "I encountered a problem while trying to perform that action."
                };
                Some(friendly.to_string())
            }
        }
    }

    /// Publishes the final event directly, with no LLM call, and persists
    /// the reply into the running chat history.
    async fn finish_with_verbatim_reply(&self, turn_id: &str, reply: &str, room: &dyn RoomPublisher) {
        self.chat_ctx.write().push(Message::assistant(reply));
        room.publish_chat_event(ChatEvent::AssistantFinal {
            turn_id: turn_id.to_string(),
            content: reply.to_string(),
            timestamp: crate::room::now_ms(),
        })
        .await;
        self.after_turn().await;
    }

    /// Step 7: stream the LLM's reply, publishing ordered deltas, then the
    /// final event.
    async fn stream_llm_reply(
        &self,
        turn_id: &str,
        delta_seq: &mut u64,
        system_extras: Vec<String>,
        room: &dyn RoomPublisher,
    ) -> Result<()> {
        let tool_defs: Vec<ToolDefinition> = self
            .state
            .tool_registry
            .all()
            .into_iter()
            .map(|m| ToolDefinition { name: m.name, description: m.description, parameters: m.parameters })
            .collect();

        let builder: ContextBuilder = {
            let extras = system_extras.clone();
            Arc::new(move |_user_msg: &str| {
                let mut prompt = BASE_SYSTEM_PROMPT.to_string();
                for extra in &extras {
                    prompt.push_str("\n\n");
                    prompt.push_str(extra);
                }
                (prompt, tool_defs.clone())
            })
        };

        let snapshot = self.chat_ctx.read().clone();
        let mut stream = match self.state.smart_llm.chat(&snapshot, &builder).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, turn_id, "llm call failed before streaming started");
                return Err(e);
            }
        };

        let mut buffer = String::new();
        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Token { text }) => {
                    buffer.push_str(&text);
                    room.publish_chat_event(ChatEvent::AssistantDelta {
                        turn_id: turn_id.to_string(),
                        content: text.clone(),
                        seq: *delta_seq,
                        timestamp: crate::room::now_ms(),
                    })
                    .await;
                    *delta_seq += 1;
                    // Drive the TTS proxy with just this chunk; consuming
                    // the audio frames into a real sink is the media-room
                    // transport's concern, outside this orchestrator.
                    let mut frames = self.state.tts.synthesize(&text).await;
                    while frames.next().await.is_some() {}
                }
                Ok(StreamEvent::Done { .. }) => break,
                Ok(StreamEvent::Error { message }) => {
                    tracing::warn!(turn_id, error = %message, "llm stream reported an error event");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(turn_id, error = %e, "llm stream failed mid-turn");
                    return Err(e);
                }
            }
        }

        self.chat_ctx.write().push(Message::assistant(buffer.clone()));
        room.publish_chat_event(ChatEvent::AssistantFinal {
            turn_id: turn_id.to_string(),
            content: buffer,
            timestamp: crate::room::now_ms(),
        })
        .await;
        self.after_turn().await;
        Ok(())
    }

    /// Queries the local memory store for the standing "current context
    /// and preferences" bullets via the same path `inject_memories` uses,
    /// but against a scratch context so the bullets can be folded into
    /// the per-turn system prompt instead of a chat message (the Smart
    /// LLM wrapper rebuilds its own system-prefixed context and drops any
    /// system messages the caller supplies — see DESIGN.md).
    async fn gather_memory_context(&self) -> String {
        let mut scratch = Vec::new();
        if let Err(e) = self.state.memory.inject_memories(&mut scratch, &self.user_id).await {
            tracing::warn!(error = %e, user_id = %self.user_id, "memory injection failed, continuing without context");
            return String::new();
        }
        scratch
            .into_iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.extract_all_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn after_turn(&self) {
        self.turn_counter.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.chat_ctx.read().clone();
        if let Err(e) = self.state.memory.save_session_context(&snapshot, &self.user_id).await {
            tracing::warn!(error = %e, user_id = %self.user_id, "failed to persist turn into memory");
        }
        if let Err(e) = self.state.memory.summarize_session(&snapshot, self.state.config.memory.summarize_threshold).await {
            tracing::warn!(error = %e, user_id = %self.user_id, "session summarisation failed");
        }
        self.state.guardrails.check_duration();
    }
}

fn name_pattern_regexes() -> &'static [Regex] {
    use std::sync::OnceLock;
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        vec![
            Regex::new(r"(?i)name\s+is\s+(\w+)").unwrap(),
            Regex::new(r"(?i)called\s+(\w+)").unwrap(),
            Regex::new(r"(?i)user'?s?\s+name[:\s]+(\w+)").unwrap(),
        ]
    })
}

fn extract_name_from_memory(memory_context: &str) -> Option<String> {
    if memory_context.trim().is_empty() {
        return None;
    }
    for re in name_pattern_regexes() {
        if let Some(caps) = re.captures(memory_context) {
            return Some(caps.get(1).unwrap().as_str().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::BroadcastRoom;

    #[tokio::test]
    async fn mode_switch_phrases_flip_mode_without_llm() {
        let state = crate::state::test_support::build_test_state().await;
        let orch = TurnOrchestrator::new(state, "u1", UserRole::Trusted);
        let room = BroadcastRoom::default();
        let mut rx = room.subscribe_chat();

        orch.handle_user_message("please switch to direct mode", &room).await.unwrap();
        assert_eq!(orch.mode(), AgentMode::Direct);

        let _user_evt = rx.recv().await.unwrap();
        let final_evt = rx.recv().await.unwrap();
        match final_evt {
            ChatEvent::AssistantFinal { content, .. } => assert_eq!(content, "I have switched to Direct Mode."),
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// §8 scenario S1: ADMIN + "set an alarm for 8am" executes the tool and
    /// confirms, instead of stalling on a missing-parameter clarification.
    #[tokio::test]
    async fn s1_fast_path_tool_action_executes_and_confirms() {
        let state = crate::state::test_support::build_test_state().await;
        let orch = TurnOrchestrator::new(state, "u1", UserRole::Admin);
        let room = BroadcastRoom::default();
        let mut rx = room.subscribe_chat();

        orch.handle_user_message("set an alarm for 8am", &room).await.unwrap();

        match rx.recv().await.unwrap() {
            ChatEvent::UserMessage { content, .. } => assert_eq!(content, "set an alarm for 8am"),
            other => panic!("expected UserMessage, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ChatEvent::ToolExecution { tool, status, .. } => {
                assert_eq!(tool, "set_alarm");
                assert_eq!(status, ToolExecutionStatus::Started);
            }
            other => panic!("expected ToolExecution(started), got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ChatEvent::ToolExecution { tool, status, .. } => {
                assert_eq!(tool, "set_alarm");
                assert_eq!(status, ToolExecutionStatus::Finished);
            }
            other => panic!("expected ToolExecution(finished), got {other:?}"),
        }
        // Falls through to LLM phrasing (no missing-parameter clarification
        // short-circuited the turn) and closes with an assistant_final.
        match rx.recv().await.unwrap() {
            ChatEvent::AssistantFinal { .. } => {}
            other => panic!("expected AssistantFinal, got {other:?}"),
        }
    }

    /// §8 scenario S2: GUEST + "send an email to alice@example.com saying
    /// hi" is denied by the gate with the exact spoken denial, and never
    /// reaches the LLM.
    #[tokio::test]
    async fn s2_governance_denial_returns_exact_message_without_llm() {
        let state = crate::state::test_support::build_test_state().await;
        let orch = TurnOrchestrator::new(state, "u1", UserRole::Guest);
        let room = BroadcastRoom::default();
        let mut rx = room.subscribe_chat();

        orch
            .handle_user_message("send an email to alice@example.com saying hi", &room)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ChatEvent::UserMessage { .. } => {}
            other => panic!("expected UserMessage, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ChatEvent::ToolExecution { tool, status, .. } => {
                assert_eq!(tool, "send_email");
                assert_eq!(status, ToolExecutionStatus::Started);
            }
            other => panic!("expected ToolExecution(started), got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ChatEvent::ToolExecution { tool, status, .. } => {
                assert_eq!(tool, "send_email");
                assert_eq!(status, ToolExecutionStatus::Finished);
            }
            other => panic!("expected ToolExecution(finished), got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            ChatEvent::AssistantFinal { content, .. } => assert_eq!(
                content,
                "⛔ Permission Denied: 'send_email' is classified as HIGH risk. \
                 Your role (GUEST) only allows up to LOW risk."
            ),
            other => panic!("expected AssistantFinal, got {other:?}"),
        }
    }

    #[test]
    fn extracts_name_from_memory_text() {
        assert_eq!(extract_name_from_memory("the user's name is: Priya"), Some("Priya".to_string()));
        assert_eq!(extract_name_from_memory("no identifying info here"), None);
    }
}
