//! Session summariser (grounded on the
//! originating `summarizer` module): a thin LLM client invoked only from
//! `summarize_session`. Failures are caught and logged, never propagated.

use std::sync::Arc;

use conductor_domain::tool::Message;
use conductor_providers::traits::{ChatRequest, LlmProvider};

/// Well-known user id summaries are stored under.
pub const SYSTEM_SUMMARY_USER_ID: &str = "system_summary";

pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Summarise `messages` into a short paragraph. Returns `None` (rather
    /// than an error) on any failure — a failed summarisation simply skips
    /// storing a summary for that turn.
    pub async fn summarize(&self, messages: &[Message]) -> Option<String> {
        let transcript = messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content.extract_all_text()))
            .collect::<Vec<_>>()
            .join("\n");

        let req = ChatRequest {
            messages: vec![
                Message::system(
                    "Summarise the following conversation in 2-4 sentences, \
                     preserving names, preferences, and commitments made.",
                ),
                Message::user(transcript),
            ],
            ..Default::default()
        };

        match self.llm.chat(req).await {
            Ok(resp) if !resp.content.trim().is_empty() => Some(resp.content),
            Ok(_) => {
                tracing::warn!("summariser returned empty content, skipping summary storage");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "summarisation failed, skipping summary storage");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::capability::LlmCapabilities;
    use conductor_domain::error::{Error, Result};
    use conductor_domain::stream::{BoxStream, StreamEvent};
    use conductor_providers::traits::{ChatResponse, EmbeddingsRequest, EmbeddingsResponse};

    struct StubLlm {
        reply: Result<String>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse> {
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    tool_calls: vec![],
                    usage: None,
                    model: "stub".into(),
                    finish_reason: Some("stop".into()),
                }),
                Err(_) => Err(Error::Provider { provider: "stub".into(), message: "boom".into() }),
            }
        }
        async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            unimplemented!()
        }
        async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
            unimplemented!()
        }
        fn capabilities(&self) -> &LlmCapabilities {
            unimplemented!()
        }
        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn summarize_returns_content_on_success() {
        let summarizer = Summarizer::new(Arc::new(StubLlm { reply: Ok("Alice likes Rust.".into()) }));
        let out = summarizer.summarize(&[Message::user("I love Rust")]).await;
        assert_eq!(out, Some("Alice likes Rust.".to_string()));
    }

    #[tokio::test]
    async fn summarize_returns_none_on_failure() {
        let summarizer = Summarizer::new(Arc::new(StubLlm { reply: Err(Error::Other("x".into())) }));
        let out = summarizer.summarize(&[Message::user("hi")]).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn summarize_returns_none_on_empty_content() {
        let summarizer = Summarizer::new(Arc::new(StubLlm { reply: Ok("   ".into()) }));
        let out = summarizer.summarize(&[Message::user("hi")]).await;
        assert_eq!(out, None);
    }
}
