//! Flat-file [`VectorIndex`] implementation.
//!
//! The whole index is held in an [`InMemoryIndex`] and written to
//! `<index dir>/index.json` after every mutation. Writes go to a temporary
//! file first and are renamed into place, so a crash mid-write leaves the
//! previous snapshot intact. If persisting fails the in-memory change is
//! rolled back.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use petcare_rag_core::models::{DocumentBatch, IndexMeta, ScoredChunk};
use petcare_rag_core::store::memory::{InMemoryIndex, IndexSnapshot};
use petcare_rag_core::store::VectorIndex;
use petcare_rag_core::{RagError, Result};

pub const FILE_NAME: &str = "index.json";

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(FILE_NAME)
}

pub struct FlatFileIndex {
    path: PathBuf,
    inner: InMemoryIndex,
    // Serializes mutate-then-persist sequences
    write: Mutex<()>,
}

impl FlatFileIndex {
    /// Load the snapshot in `dir`, or start an empty index there.
    pub async fn open(dir: &Path) -> Result<Self> {
        let path = snapshot_path(dir);
        let inner = if path.exists() {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| RagError::index(format!("cannot read {}: {}", path.display(), e)))?;
            let snapshot: IndexSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                RagError::index(format!("corrupt index snapshot {}: {}", path.display(), e))
            })?;
            debug!(path = %path.display(), records = snapshot.records.len(), "loaded index snapshot");
            InMemoryIndex::from_snapshot(snapshot)
        } else {
            InMemoryIndex::new()
        };

        let index = Self {
            path,
            inner,
            write: Mutex::new(()),
        };
        if !index.path.exists() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| RagError::index(format!("cannot create {}: {}", dir.display(), e)))?;
            index.persist().await?;
        }
        Ok(index)
    }

    async fn persist(&self) -> Result<()> {
        let snapshot = self.inner.snapshot()?;
        let json = serde_json::to_vec(&snapshot).map_err(RagError::index)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| RagError::index(format!("cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RagError::index(format!("cannot replace {}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FlatFileIndex {
    fn backend(&self) -> &'static str {
        "flatfile"
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        self.inner.meta().await
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        self.inner.sources().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn insert_document(&self, batch: &DocumentBatch) -> Result<usize> {
        let _guard = self.write.lock().await;

        let mut fresh = Vec::new();
        for record in &batch.records {
            if !self.inner.contains(&record.chunk.id)? {
                fresh.push(record.chunk.id.clone());
            }
        }

        let inserted = self.inner.insert_document(batch).await?;
        if inserted == 0 {
            return Ok(0);
        }

        if let Err(e) = self.persist().await {
            self.inner.remove_ids(&fresh)?;
            return Err(e);
        }
        Ok(inserted)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.inner.query(vector, k).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write.lock().await;
        let previous = self.inner.snapshot()?;
        self.inner.clear().await?;

        if let Err(e) = self.persist().await {
            // Put the old records back, meta included
            for batch in regroup(previous) {
                self.inner.insert_document(&batch).await?;
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Split a snapshot back into per-source batches.
fn regroup(snapshot: IndexSnapshot) -> Vec<DocumentBatch> {
    let Some(meta) = snapshot.meta else {
        return Vec::new();
    };
    let mut batches: Vec<DocumentBatch> = Vec::new();
    for record in snapshot.records {
        match batches.iter_mut().find(|b| b.source == record.chunk.source) {
            Some(batch) => batch.records.push(record),
            None => batches.push(DocumentBatch {
                source: record.chunk.source.clone(),
                model: meta.model.clone(),
                records: vec![record],
            }),
        }
    }
    batches
}
