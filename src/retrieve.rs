//! Query-time retrieval: embed the question, ask the index for neighbours.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use petcare_rag_core::embedding::{embed_query, EmbeddingProvider};
use petcare_rag_core::models::{Chunk, ScoredChunk};
use petcare_rag_core::store::VectorIndex;
use petcare_rag_core::{Capability, Result};

use crate::capability::bounded;

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            embed_timeout,
        }
    }

    /// Up to `k` chunks with their similarity scores, best first.
    pub async fn retrieve_scored(&self, question: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = bounded(
            Capability::Embedding,
            self.embed_timeout,
            embed_query(self.embedder.as_ref(), question),
        )
        .await?;
        let hits = self.index.query(&vector, k).await?;
        debug!(
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved chunks"
        );
        Ok(hits)
    }

    /// Up to `k` chunks, best first.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .retrieve_scored(question, k)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }
}
