//! Embeds memory text via a configured LLM provider's embeddings endpoint.

use std::sync::Arc;

use conductor_domain::error::{Error, Result};
use conductor_providers::traits::{EmbeddingsRequest, LlmProvider};

use crate::local_engine::Embedder;

pub struct LlmEmbedder {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
}

impl LlmEmbedder {
    pub fn new(provider: Arc<dyn LlmProvider>, model: Option<String>) -> Self {
        Self { provider, model }
    }
}

#[async_trait::async_trait]
impl Embedder for LlmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let req = EmbeddingsRequest {
            input: vec![text.to_string()],
            model: self.model.clone(),
        };
        let resp = self.provider.embeddings(req).await?;
        resp.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider {
                provider: self.provider.provider_id().to_string(),
                message: "embeddings response contained no vectors".into(),
            })
    }
}
