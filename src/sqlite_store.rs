//! SQLite-backed [`VectorIndex`] implementation.
//!
//! Records live in `<index dir>/index.sqlite` (WAL mode, pooled). Vectors are
//! stored as little-endian `f32` BLOBs and searched brute-force with cosine
//! similarity, which is plenty for a knowledge base of a few thousand chunks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};

use petcare_rag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use petcare_rag_core::models::{Chunk, DocumentBatch, IndexMeta, ScoredChunk};
use petcare_rag_core::store::{check_batch, check_query, rank, VectorIndex};
use petcare_rag_core::{RagError, Result};

use crate::{db, migrate};

pub const FILE_NAME: &str = "index.sqlite";

/// Database file of a SQLite index stored in `dir`.
pub fn db_path(dir: &Path) -> PathBuf {
    dir.join(FILE_NAME)
}

/// SQLite implementation of the [`VectorIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (creating if needed) the index in `dir` and apply the schema.
    pub async fn open(dir: &Path) -> Result<Self> {
        let pool = db::connect(&db_path(dir)).await.map_err(|e| {
            RagError::index(format!("cannot open {}: {:#}", db_path(dir).display(), e))
        })?;
        migrate::run_migrations(&pool)
            .await
            .map_err(|e| RagError::index(format!("{:#}", e)))?;
        Ok(Self { pool })
    }
}

async fn read_meta<'e, E>(executor: E) -> Result<Option<IndexMeta>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(executor)
        .await
        .map_err(RagError::index)?;

    let mut model = None;
    let mut dims = None;
    for row in &rows {
        let key: String = row.get("key");
        let value: String = row.get("value");
        match key.as_str() {
            "model" => model = Some(value),
            "dims" => {
                dims = Some(value.parse::<usize>().map_err(|e| {
                    RagError::index(format!("corrupt dims in index_meta: {}", e))
                })?)
            }
            _ => {}
        }
    }

    Ok(match (model, dims) {
        (Some(model), Some(dims)) => Some(IndexMeta { model, dims }),
        _ => None,
    })
}

fn row_to_chunk(row: &SqliteRow) -> Chunk {
    Chunk {
        id: row.get("id"),
        source: row.get("source"),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        hash: row.get("hash"),
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        read_meta(&self.pool).await
    }

    async fn sources(&self) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT DISTINCT source FROM records")
            .fetch_all(&self.pool)
            .await
            .map_err(RagError::index)?;
        Ok(rows.iter().map(|row| row.get("source")).collect())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::index)?;
        Ok(count as usize)
    }

    async fn insert_document(&self, batch: &DocumentBatch) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(RagError::index)?;

        let current = read_meta(&mut *tx).await?;
        if let Some(meta) = check_batch(current.as_ref(), batch)? {
            sqlx::query(
                r#"
                INSERT INTO index_meta (key, value) VALUES ('model', ?), ('dims', ?)
                ON CONFLICT(key) DO NOTHING
                "#,
            )
            .bind(&meta.model)
            .bind(meta.dims.to_string())
            .execute(&mut *tx)
            .await
            .map_err(RagError::index)?;
        }

        let now = chrono::Utc::now().timestamp();
        let mut inserted = 0;
        for record in &batch.records {
            let chunk = &record.chunk;
            let result = sqlx::query(
                r#"
                INSERT INTO records (id, source, chunk_index, content, hash, embedding, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(RagError::index)?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(RagError::index)?;
        Ok(inserted)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        check_query(self.meta().await?.as_ref(), vector)?;

        let rows = sqlx::query(
            "SELECT id, source, chunk_index, content, hash, embedding FROM records \
             ORDER BY source, chunk_index",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::index)?;

        let candidates = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                ScoredChunk {
                    chunk: row_to_chunk(row),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(candidates, k))
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(RagError::index)?;
        sqlx::query("DELETE FROM records")
            .execute(&mut *tx)
            .await
            .map_err(RagError::index)?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await
            .map_err(RagError::index)?;
        tx.commit().await.map_err(RagError::index)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petcare_rag_core::chunk::{content_hash, record_id};
    use petcare_rag_core::models::IndexedRecord;
    use tempfile::TempDir;

    fn batch(source: &str, model: &str, vectors: Vec<Vec<f32>>) -> DocumentBatch {
        let records = vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| {
                let content = format!("{} chunk {}", source, i);
                IndexedRecord {
                    chunk: Chunk {
                        id: record_id(source, i as i64),
                        source: source.to_string(),
                        chunk_index: i as i64,
                        hash: content_hash(&content),
                        content,
                    },
                    vector,
                }
            })
            .collect();
        DocumentBatch {
            source: source.to_string(),
            model: model.to_string(),
            records,
        }
    }

    #[tokio::test]
    async fn test_empty_index() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.meta().await.unwrap().is_none());
        assert!(index.query(&[1.0, 0.0], 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_query_and_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let index = SqliteIndex::open(tmp.path()).await.unwrap();
            let inserted = index
                .insert_document(&batch("dogs.txt", "m", vec![vec![1.0, 0.0], vec![0.6, 0.8]]))
                .await
                .unwrap();
            assert_eq!(inserted, 2);
            index
                .insert_document(&batch("cats.txt", "m", vec![vec![0.0, 1.0]]))
                .await
                .unwrap();
        }

        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
        assert_eq!(
            index.meta().await.unwrap(),
            Some(IndexMeta {
                model: "m".to_string(),
                dims: 2
            })
        );
        let sources: Vec<String> = index.sources().await.unwrap().into_iter().collect();
        assert_eq!(sources, vec!["cats.txt", "dogs.txt"]);

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.source, "dogs.txt");
        assert_eq!(hits[0].chunk.chunk_index, 0);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_tied_scores_follow_source_order() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        for source in ["rabbits.txt", "cats.txt", "dogs.txt"] {
            index
                .insert_document(&batch(source, "m", vec![vec![1.0, 0.0]]))
                .await
                .unwrap();
        }
        let hits = index.query(&[1.0, 0.0], 3).await.unwrap();
        let sources: Vec<&str> = hits.iter().map(|h| h.chunk.source.as_str()).collect();
        assert_eq!(sources, vec!["cats.txt", "dogs.txt", "rabbits.txt"]);
    }

    #[tokio::test]
    async fn test_reinsert_is_noop() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        let b = batch("dogs.txt", "m", vec![vec![1.0, 0.0]]);
        assert_eq!(index.insert_document(&b).await.unwrap(), 1);
        assert_eq!(index.insert_document(&b).await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mismatch_refused_and_nothing_stored() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        index
            .insert_document(&batch("dogs.txt", "m", vec![vec![1.0, 0.0]]))
            .await
            .unwrap();

        let err = index
            .insert_document(&batch("cats.txt", "m", vec![vec![1.0, 0.0, 0.0]]))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));

        let err = index
            .insert_document(&batch("cats.txt", "other", vec![vec![1.0, 0.0]]))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));

        assert_eq!(index.count().await.unwrap(), 1);
        assert!(index.query(&[1.0, 0.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_resets_meta() {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(tmp.path()).await.unwrap();
        index
            .insert_document(&batch("dogs.txt", "m", vec![vec![1.0, 0.0]]))
            .await
            .unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.meta().await.unwrap().is_none());
        index
            .insert_document(&batch("dogs.txt", "new-model", vec![vec![1.0, 0.0, 0.0]]))
            .await
            .unwrap();
        assert_eq!(index.meta().await.unwrap().unwrap().dims, 3);
    }
}
