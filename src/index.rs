//! Index maintenance: full builds and incremental syncs.
//!
//! The [`Indexer`] turns documents into chunks, embeds them in batches, and
//! inserts each document's records as one unit. Only one write pass runs at
//! a time; queries against the index are never blocked.
//!
//! # Sync
//!
//! [`Indexer::sync`] diffs the scanned documents against the index manifest
//! (the sources already stored). Documents whose source is already present
//! are left alone, even if their content changed; `petcare build` re-embeds
//! everything. With nothing new to index, sync makes no embedding calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use petcare_rag_core::chunk::{chunk_document, ChunkParams};
use petcare_rag_core::embedding::{validate_vectors, EmbeddingProvider};
use petcare_rag_core::models::{Document, DocumentBatch, IndexedRecord};
use petcare_rag_core::store::VectorIndex;
use petcare_rag_core::{Capability, RagError, Result};

use crate::capability::bounded;

/// Outcome of a build or sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub documents_seen: usize,
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    /// True when the pass found nothing new to index.
    pub up_to_date: bool,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.up_to_date {
            write!(f, "index up to date ({} documents)", self.documents_seen)
        } else {
            write!(
                f,
                "indexed {} of {} documents ({} chunks)",
                self.documents_indexed, self.documents_seen, self.chunks_indexed
            )
        }
    }
}

pub struct Indexer {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    params: ChunkParams,
    batch_size: usize,
    embed_timeout: Duration,
    write_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        params: ChunkParams,
        batch_size: usize,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            params,
            batch_size: batch_size.max(1),
            embed_timeout,
            write_lock: Mutex::new(()),
        }
    }

    /// Discard the index contents and index every document.
    pub async fn build(&self, documents: &[Document]) -> Result<SyncReport> {
        let _guard = self.write_lock.lock().await;
        info!(
            backend = self.index.backend(),
            documents = documents.len(),
            "building index from scratch"
        );
        self.index.clear().await?;
        self.index_all(documents.iter().collect(), documents.len())
            .await
    }

    /// Index only documents whose source is not yet in the manifest.
    pub async fn sync(&self, documents: &[Document]) -> Result<SyncReport> {
        let _guard = self.write_lock.lock().await;
        let manifest = self.index.sources().await?;
        let pending: Vec<&Document> = documents
            .iter()
            .filter(|doc| !manifest.contains(&doc.source))
            .collect();

        if pending.is_empty() {
            debug!(documents = documents.len(), "index up to date");
            return Ok(SyncReport {
                documents_seen: documents.len(),
                up_to_date: true,
                ..SyncReport::default()
            });
        }

        info!(
            new_documents = pending.len(),
            indexed = manifest.len(),
            "syncing index"
        );
        self.index_all(pending, documents.len()).await
    }

    async fn index_all(&self, documents: Vec<&Document>, seen: usize) -> Result<SyncReport> {
        let mut report = SyncReport {
            documents_seen: seen,
            up_to_date: documents.is_empty(),
            ..SyncReport::default()
        };
        for doc in documents {
            let chunks = self.index_document(doc).await?;
            if chunks > 0 {
                report.documents_indexed += 1;
                report.chunks_indexed += chunks;
            }
        }
        info!(
            documents = report.documents_indexed,
            chunks = report.chunks_indexed,
            "index pass complete"
        );
        Ok(report)
    }

    /// Chunk, embed, and insert one document. Returns the number of new
    /// records.
    async fn index_document(&self, doc: &Document) -> Result<usize> {
        let chunks = chunk_document(doc, self.params);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = bounded(
                Capability::Embedding,
                self.embed_timeout,
                self.embedder.embed(batch),
            )
            .await?;
            let dims = validate_vectors(&embedded, batch.len())?;
            let configured = self.embedder.dims();
            if configured > 0 && dims != configured {
                return Err(RagError::DimensionMismatch {
                    expected: configured,
                    actual: dims,
                });
            }
            vectors.extend(embedded);
        }

        let records = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexedRecord { chunk, vector })
            .collect();
        let batch = DocumentBatch {
            source: doc.source.clone(),
            model: self.embedder.model_name().to_string(),
            records,
        };

        let inserted = self.index.insert_document(&batch).await?;
        debug!(source = %doc.source, chunks = inserted, "indexed document");
        Ok(inserted)
    }
}
