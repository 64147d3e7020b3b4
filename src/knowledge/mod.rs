//! Knowledge-base search used to ground answers.
//!
//! Tools only see the [`KnowledgeBase`] trait. [`InMemoryKnowledgeBase`] is a small
//! embedding-backed implementation good enough for demos and tests; production deployments
//! plug a vector database client in behind the same trait.

use crate::error::{CampusAgentError, Result};
use crate::llm::LlmBroker;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// One search result, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Up to `top_k` hits ordered by descending score; no match is an empty list
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>>;
}

struct Document {
    text: String,
    metadata: HashMap<String, Value>,
    vector: Vec<f32>,
}

/// Documents embedded through an [`LlmBroker`] and ranked by cosine similarity
pub struct InMemoryKnowledgeBase {
    broker: LlmBroker,
    documents: DashMap<usize, Document>,
    next_id: AtomicUsize,
}

impl InMemoryKnowledgeBase {
    pub fn new(broker: LlmBroker) -> Self {
        Self {
            broker,
            documents: DashMap::new(),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Embed and store a document, returning its id
    pub async fn add_document(
        &self,
        text: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Result<usize> {
        let text = text.into();
        let vector = self.broker.embed(&text).await?;
        if vector.is_empty() {
            return Err(CampusAgentError::GatewayError(
                "Embedding model returned an empty vector".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.documents.insert(id, Document { text, metadata, vector });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns 0.0 if either vector has zero magnitude.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            0.0
        } else {
            dot_product / (norm_a * norm_b)
        }
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.documents.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.broker.embed(query).await?;

        let mut scored: Vec<(usize, SearchHit)> = self
            .documents
            .iter()
            .map(|entry| {
                let doc = entry.value();
                (
                    *entry.key(),
                    SearchHit {
                        text: doc.text.clone(),
                        score: Self::cosine_similarity(&query_vector, &doc.vector),
                        metadata: doc.metadata.clone(),
                    },
                )
            })
            .collect();

        // Ties keep insertion order
        scored.sort_by(|(id_a, a), (id_b, b)| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(id_a.cmp(id_b))
        });
        scored.truncate(top_k);

        debug!(query, hits = scored.len(), "Knowledge base search");
        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }
}
