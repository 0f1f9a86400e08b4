//! In-memory [`VectorIndex`] implementation.
//!
//! Uses a `Vec` and a `HashSet` of ids behind `std::sync::RwLock`. Vector
//! search is brute-force cosine similarity over all stored vectors. Also the
//! working set of the flat-file backend, which persists [`IndexSnapshot`]s.

use std::collections::{BTreeSet, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{DocumentBatch, IndexMeta, IndexedRecord, ScoredChunk};

use super::{check_batch, check_query, rank, VectorIndex};

/// Serializable full contents of an index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub meta: Option<IndexMeta>,
    pub records: Vec<IndexedRecord>,
}

#[derive(Default)]
struct State {
    meta: Option<IndexMeta>,
    records: Vec<IndexedRecord>,
    ids: HashSet<String>,
}

/// Non-persistent index for tests and the `memory` backend.
pub struct InMemoryIndex {
    state: RwLock<State>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let ids = snapshot.records.iter().map(|r| r.chunk.id.clone()).collect();
        Self {
            state: RwLock::new(State {
                meta: snapshot.meta,
                records: snapshot.records,
                ids,
            }),
        }
    }

    pub fn snapshot(&self) -> Result<IndexSnapshot> {
        let state = self.read()?;
        Ok(IndexSnapshot {
            meta: state.meta.clone(),
            records: state.records.clone(),
        })
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.ids.contains(id))
    }

    /// Remove records by id. Used to roll back an insert whose persistence
    /// failed.
    pub fn remove_ids(&self, ids: &[String]) -> Result<usize> {
        let mut state = self.write()?;
        let doomed: HashSet<&String> = ids.iter().collect();
        let before = state.records.len();
        state.records.retain(|r| !doomed.contains(&r.chunk.id));
        for id in ids {
            state.ids.remove(id);
        }
        if state.records.is_empty() {
            state.meta = None;
        }
        Ok(before - state.records.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RagError::index("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RagError::index("in-memory index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        Ok(self.read()?.meta.clone())
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .read()?
            .records
            .iter()
            .map(|r| r.chunk.source.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    async fn insert_document(&self, batch: &DocumentBatch) -> Result<usize> {
        let mut state = self.write()?;
        if let Some(meta) = check_batch(state.meta.as_ref(), batch)? {
            state.meta = Some(meta);
        }

        let mut inserted = 0;
        for record in &batch.records {
            if state.ids.insert(record.chunk.id.clone()) {
                state.records.push(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let state = self.read()?;
        if state.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        check_query(state.meta.as_ref(), vector)?;

        let candidates = state
            .records
            .iter()
            .map(|r| ScoredChunk {
                chunk: r.chunk.clone(),
                score: cosine_similarity(vector, &r.vector),
            })
            .collect();
        Ok(rank(candidates, k))
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.write()?;
        *state = State::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{content_hash, record_id};
    use crate::models::Chunk;

    fn record(source: &str, index: i64, content: &str, vector: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            chunk: Chunk {
                id: record_id(source, index),
                source: source.to_string(),
                chunk_index: index,
                content: content.to_string(),
                hash: content_hash(content),
            },
            vector,
        }
    }

    fn batch(source: &str, records: Vec<IndexedRecord>) -> DocumentBatch {
        DocumentBatch {
            source: source.to_string(),
            model: "test-model".to_string(),
            records,
        }
    }

    async fn seeded() -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index
            .insert_document(&batch(
                "dogs.txt",
                vec![
                    record("dogs.txt", 0, "walks", vec![1.0, 0.0, 0.0]),
                    record("dogs.txt", 1, "water", vec![0.0, 1.0, 0.0]),
                ],
            ))
            .await
            .unwrap();
        index
            .insert_document(&batch(
                "fish.txt",
                vec![record("fish.txt", 0, "tank", vec![0.0, 0.0, 1.0])],
            ))
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_empty_index_query_is_empty() {
        let index = InMemoryIndex::new();
        assert!(index.query(&[1.0, 0.0], 4).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.meta().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_ranks_exact_match_first() {
        let index = seeded().await;
        for k in 1..=3 {
            let hits = index.query(&[0.0, 0.9, 0.1], k).await.unwrap();
            assert_eq!(hits.len(), k);
            assert_eq!(hits[0].chunk.content, "water");
        }
    }

    #[tokio::test]
    async fn test_query_returns_fewer_than_k() {
        let index = seeded().await;
        let hits = index.query(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
        assert!(index.query(&[1.0, 0.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reinsert_is_idempotent() {
        let index = seeded().await;
        let again = index
            .insert_document(&batch(
                "fish.txt",
                vec![record("fish.txt", 0, "tank", vec![0.0, 0.0, 1.0])],
            ))
            .await
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sources_manifest() {
        let index = seeded().await;
        let sources: Vec<String> = index.sources().await.unwrap().into_iter().collect();
        assert_eq!(sources, vec!["dogs.txt".to_string(), "fish.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_refused() {
        let index = seeded().await;
        let err = index
            .insert_document(&batch(
                "cats.txt",
                vec![record("cats.txt", 0, "naps", vec![1.0, 0.0])],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.count().await.unwrap(), 3);
        assert!(index.query(&[1.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_model_mismatch_is_refused() {
        let index = seeded().await;
        let mut other = batch("cats.txt", vec![record("cats.txt", 0, "naps", vec![1.0, 0.0, 0.0])]);
        other.model = "another-model".to_string();
        let err = index.insert_document(&other).await.unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear_resets_meta() {
        let index = seeded().await;
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.meta().await.unwrap().is_none());
        index
            .insert_document(&batch("cats.txt", vec![record("cats.txt", 0, "naps", vec![1.0, 0.0])]))
            .await
            .unwrap();
        assert_eq!(index.meta().await.unwrap().unwrap().dims, 2);
    }

    #[tokio::test]
    async fn test_snapshot_and_remove_ids() {
        let index = seeded().await;
        let restored = InMemoryIndex::from_snapshot(index.snapshot().unwrap());
        assert_eq!(restored.count().await.unwrap(), 3);
        assert!(restored.contains(&record_id("fish.txt", 0)).unwrap());

        let removed = restored.remove_ids(&[record_id("fish.txt", 0)]).unwrap();
        assert_eq!(removed, 1);
        assert!(!restored.sources().await.unwrap().contains("fish.txt"));
    }
}
