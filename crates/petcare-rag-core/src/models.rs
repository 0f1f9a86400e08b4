//! Core data models.
//!
//! These types represent the documents, chunks, and indexed records that flow
//! through the ingestion (write) and retrieval (read) paths.

use serde::{Deserialize, Serialize};

/// A source text read from the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the knowledge-base directory, `/`-separated.
    pub source: String,
    pub content: String,
}

impl Document {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// A bounded slice of a document; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic UUIDv5 of `(source, chunk_index)`.
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub content: String,
    /// SHA-256 of `content`, hex encoded.
    pub hash: String,
}

/// A chunk paired with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// All records produced for one document, inserted as a unit.
#[derive(Debug, Clone)]
pub struct DocumentBatch {
    pub source: String,
    /// Embedding model that produced the vectors.
    pub model: String,
    pub records: Vec<IndexedRecord>,
}

/// Embedding model and dimensionality established for an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub model: String,
    pub dims: usize,
}

/// A retrieved chunk with its similarity to the query (higher is better).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}
