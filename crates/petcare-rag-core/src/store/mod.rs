//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines every storage operation the indexing and
//! retrieval paths need, so backends (SQLite, flat-file snapshot, in-memory)
//! are interchangeable and chosen by configuration.
//!
//! Implementations must be `Send + Sync` and safe to query concurrently.
//! [`VectorIndex::insert_document`] must be atomic per document: a
//! concurrent query sees either none or all of a document's records.

pub mod memory;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{DocumentBatch, IndexMeta, ScoredChunk};

/// Durable, queryable storage of indexed records.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`meta`](VectorIndex::meta) | Model and dimensionality established by the first insert |
/// | [`sources`](VectorIndex::sources) | The manifest: distinct sources already indexed |
/// | [`count`](VectorIndex::count) | Number of stored records |
/// | [`insert_document`](VectorIndex::insert_document) | Atomically add one document's records |
/// | [`query`](VectorIndex::query) | Top-k records by cosine similarity |
/// | [`clear`](VectorIndex::clear) | Drop every record and the meta |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for logs (`"sqlite"`, `"flatfile"`, `"memory"`).
    fn backend(&self) -> &'static str;

    async fn meta(&self) -> Result<Option<IndexMeta>>;

    async fn sources(&self) -> Result<BTreeSet<String>>;

    async fn count(&self) -> Result<usize>;

    /// Insert all records of one document.
    ///
    /// Records whose id is already present are skipped. Returns the number of
    /// newly stored records. Fails with [`RagError::DimensionMismatch`] or
    /// [`RagError::ModelMismatch`] if the batch does not match the index meta,
    /// in which case nothing is stored.
    async fn insert_document(&self, batch: &DocumentBatch) -> Result<usize>;

    /// Up to `k` records, best match first. An empty index yields an empty
    /// result.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn clear(&self) -> Result<()>;
}

/// Validate a batch against the current meta.
///
/// Returns the meta to establish when the index has none yet.
pub fn check_batch(current: Option<&IndexMeta>, batch: &DocumentBatch) -> Result<Option<IndexMeta>> {
    let Some(first) = batch.records.first() else {
        return Ok(None);
    };
    let dims = first.vector.len();
    if let Some(bad) = batch.records.iter().find(|r| r.vector.len() != dims) {
        return Err(RagError::DimensionMismatch {
            expected: dims,
            actual: bad.vector.len(),
        });
    }

    match current {
        Some(meta) if meta.dims != dims => Err(RagError::DimensionMismatch {
            expected: meta.dims,
            actual: dims,
        }),
        Some(meta) if meta.model != batch.model => Err(RagError::ModelMismatch {
            indexed: meta.model.clone(),
            active: batch.model.clone(),
        }),
        Some(_) => Ok(None),
        None => Ok(Some(IndexMeta {
            model: batch.model.clone(),
            dims,
        })),
    }
}

/// Check that an embedding provider can serve an existing index.
///
/// `dims == 0` means the provider does not know its dimensionality up front,
/// so only the model name is compared.
pub fn check_model(current: Option<&IndexMeta>, model: &str, dims: usize) -> Result<()> {
    match current {
        Some(meta) if meta.model != model => Err(RagError::ModelMismatch {
            indexed: meta.model.clone(),
            active: model.to_string(),
        }),
        Some(meta) if dims != 0 && meta.dims != dims => Err(RagError::DimensionMismatch {
            expected: meta.dims,
            actual: dims,
        }),
        _ => Ok(()),
    }
}

/// Reject a query vector whose length differs from the index's.
pub fn check_query(current: Option<&IndexMeta>, vector: &[f32]) -> Result<()> {
    match current {
        Some(meta) if meta.dims != vector.len() => Err(RagError::DimensionMismatch {
            expected: meta.dims,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Sort candidates best-first and keep the top `k`.
///
/// Equal scores fall back to `(source, chunk_index)` order.
pub fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.source.cmp(&b.chunk.source))
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    candidates.truncate(k);
    candidates
}
