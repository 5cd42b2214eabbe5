//! Memory Manager: composes the local vector store with the
//! optional cloud-sync client, applies chaos fault injection, and
//! implements `inject_memories` / `save_session_context` /
//! `summarize_session`.

use std::collections::HashMap;
use std::sync::Arc;

use conductor_domain::error::{Error, Result};
use conductor_domain::tool::{Message, Role};
use conductor_telemetry::ChaosSwitchboard;

use crate::local_engine::{Embedder, LocalMemoryEngine};
use crate::summarizer::{Summarizer, SYSTEM_SUMMARY_USER_ID};

const INJECT_TOP_K: usize = 5;
const INJECT_QUERY: &str = "current context and preferences";

pub struct MemoryManager {
    local: LocalMemoryEngine,
    embedder: Arc<dyn Embedder>,
    summarizer: Option<Summarizer>,
    chaos: Arc<ChaosSwitchboard>,
}

impl MemoryManager {
    pub fn new(embedder: Arc<dyn Embedder>, summarizer: Option<Summarizer>, chaos: Arc<ChaosSwitchboard>) -> Self {
        Self {
            local: LocalMemoryEngine::new(),
            embedder,
            summarizer,
            chaos,
        }
    }

    /// Queries the local store with a broad context query, injecting the
    /// top-k results as a `system` message prepended to `chat_ctx`. A
    /// no-op (with an info log) when there are no results.
    pub async fn inject_memories(&self, chat_ctx: &mut Vec<Message>, user_id: &str) -> Result<()> {
        if self.chaos.should_fail_persistence() {
            return Err(Error::Other("Database connection timeout (Simulated Chaos)".to_string()));
        }

        let query_embedding = self.embedder.embed(INJECT_QUERY).await?;
        let hits = self.local.search(&query_embedding, user_id, INJECT_TOP_K);

        if hits.is_empty() {
            tracing::info!(user_id, "no memories to inject");
            return Ok(());
        }

        let items: Vec<String> = hits.into_iter().map(|h| h.memory.content).collect();
        let items = self.chaos.inflate_memories(items, |s| format!("{s} (INFLATED)"));

        let bullets = items.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n");
        let memory_message = Message::system(format!("Recent memories:\n{bullets}"));
        chat_ctx.insert(0, memory_message);
        tracing::info!(user_id, count = items.len(), "injected memories into context");
        Ok(())
    }

    /// Flattens each message's content and writes it as a memory tagged by
    /// role. A turn with no extractable content is a no-op.
    pub async fn save_session_context(&self, chat_ctx: &[Message], user_id: &str) -> Result<()> {
        if self.chaos.should_fail_persistence() {
            return Err(Error::Other("Database write error (Simulated Chaos)".to_string()));
        }

        for message in chat_ctx {
            let text = message.content.extract_all_text();
            if text.trim().is_empty() {
                continue;
            }
            let embedding = self.embedder.embed(&text).await?;
            let mut metadata = HashMap::new();
            metadata.insert("role".to_string(), serde_json::json!(role_tag(message.role)));
            self.local.add(user_id, text, embedding, metadata);
        }
        Ok(())
    }

    /// When `chat_ctx.len() > threshold`, summarises it and stores the
    /// summary under [`SYSTEM_SUMMARY_USER_ID`]. The conversation itself
    /// is not truncated; the summary is stored but not re-injected in the
    /// same turn. A no-op if no summariser is configured or summarisation
    /// fails.
    pub async fn summarize_session(&self, chat_ctx: &[Message], threshold: usize) -> Result<()> {
        if chat_ctx.len() <= threshold {
            return Ok(());
        }
        let Some(summarizer) = &self.summarizer else {
            return Ok(());
        };
        let Some(summary) = summarizer.summarize(chat_ctx).await else {
            return Ok(());
        };
        let embedding = self.embedder.embed(&summary).await?;
        self.local.add(SYSTEM_SUMMARY_USER_ID, summary, embedding, HashMap::new());
        Ok(())
    }

    pub fn local_memory_count(&self, user_id: &str) -> usize {
        self.local.count(user_id)
    }
}

fn role_tag(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::config::ChaosConfig;

    struct HashEmbedder;

    #[async_trait::async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Deterministic toy embedding: character frequency buckets.
            let mut v = vec![0.0f32; 8];
            for (i, b) in text.bytes().enumerate() {
                v[(b as usize + i) % 8] += 1.0;
            }
            Ok(v)
        }
    }

    fn manager() -> MemoryManager {
        MemoryManager::new(Arc::new(HashEmbedder), None, Arc::new(ChaosSwitchboard::default()))
    }

    #[tokio::test]
    async fn inject_memories_is_noop_with_no_results() {
        let mgr = manager();
        let mut ctx = vec![Message::user("hi")];
        mgr.inject_memories(&mut ctx, "alice").await.unwrap();
        assert_eq!(ctx.len(), 1);
    }

    #[tokio::test]
    async fn save_then_inject_roundtrips() {
        let mgr = manager();
        mgr.save_session_context(&[Message::user("I love hiking in Oregon")], "alice")
            .await
            .unwrap();
        let mut ctx = vec![Message::user("what do you know about me?")];
        mgr.inject_memories(&mut ctx, "alice").await.unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx[0].role, Role::System);
        assert!(ctx[0].content.extract_all_text().contains("Recent memories"));
    }

    #[tokio::test]
    async fn save_session_context_skips_empty_messages() {
        let mgr = manager();
        mgr.save_session_context(&[Message::user("   ")], "alice").await.unwrap();
        assert_eq!(mgr.local_memory_count("alice"), 0);
    }

    #[tokio::test]
    async fn summarize_session_noop_below_threshold() {
        let mgr = manager();
        let ctx: Vec<Message> = (0..5).map(|i| Message::user(format!("msg {i}"))).collect();
        mgr.summarize_session(&ctx, 20).await.unwrap();
        assert_eq!(mgr.local_memory_count(SYSTEM_SUMMARY_USER_ID), 0);
    }

    #[tokio::test]
    async fn persistence_chaos_fails_injection() {
        let mut cfg = ChaosConfig::default();
        cfg.persistence_failure_rate = 1.0;
        let mgr = MemoryManager::new(Arc::new(HashEmbedder), None, Arc::new(ChaosSwitchboard::new(cfg)));
        let mut ctx = vec![];
        let err = mgr.inject_memories(&mut ctx, "alice").await.unwrap_err();
        assert!(err.to_string().contains("Simulated Chaos"));
    }
}
