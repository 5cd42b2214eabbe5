//! In-process memory store (grounded on the
//! originating `local_engine` module): keeps `{content, metadata,
//! embedding}` tuples per `user_id` and answers similarity queries by
//! cosine distance over the embedding vectors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMemory {
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A similarity search hit.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: StoredMemory,
    pub score: f32,
}

/// Anything that turns text into an embedding vector. A thin seam so the
/// store doesn't depend on a specific provider's embeddings call.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> conductor_domain::error::Result<Vec<f32>>;
}

/// An in-process, per-`user_id` vector store. Cheap to clone (an `Arc`
/// internally would be added by the caller; this type itself wraps its
/// state behind an `RwLock` so `&self` methods suffice).
#[derive(Default)]
pub struct LocalMemoryEngine {
    by_user: RwLock<HashMap<String, Vec<StoredMemory>>>,
}

impl LocalMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: &str, content: impl Into<String>, embedding: Vec<f32>, metadata: HashMap<String, serde_json::Value>) {
        let memory = StoredMemory {
            content: content.into(),
            metadata,
            embedding,
            created_at: Utc::now(),
        };
        self.by_user.write().entry(user_id.to_string()).or_default().push(memory);
    }

    /// Cosine-similarity search against every memory stored for `user_id`,
    /// returning the top `limit` matches sorted by descending score.
    pub fn search(&self, query_embedding: &[f32], user_id: &str, limit: usize) -> Vec<ScoredMemory> {
        let guard = self.by_user.read();
        let Some(memories) = guard.get(user_id) else {
            return Vec::new();
        };
        let mut scored: Vec<ScoredMemory> = memories
            .iter()
            .map(|m| ScoredMemory {
                memory: m.clone(),
                score: cosine_similarity(query_embedding, &m.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    pub fn count(&self, user_id: &str) -> usize {
        self.by_user.read().get(user_id).map(|v| v.len()).unwrap_or(0)
    }
}

/// Cosine similarity between two equal-length vectors; `0.0` if either is
/// zero-length or a length mismatch occurs (callers should never mix
/// embedding dimensions, but a mismatch should never panic).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
