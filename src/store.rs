//! Index backend selection.

use std::sync::Arc;

use tracing::info;

use petcare_rag_core::store::memory::InMemoryIndex;
use petcare_rag_core::store::VectorIndex;
use petcare_rag_core::{RagError, Result};

use crate::config::IndexConfig;
use crate::flatfile_store::FlatFileIndex;
use crate::sqlite_store::SqliteIndex;

/// Whether the opened index already holds indexed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Created,
    Existing,
}

pub struct OpenedIndex {
    pub index: Arc<dyn VectorIndex>,
    pub state: IndexState,
}

/// Open the backend named by `config.backend` at `config.path`.
///
/// The state follows the index contents, not the files on disk: an index
/// left empty by an interrupted first build is [`IndexState::Created`]
/// again. The `memory` backend is always [`IndexState::Created`].
pub async fn open_index(config: &IndexConfig) -> Result<OpenedIndex> {
    let dir = config.path.as_path();
    let index: Arc<dyn VectorIndex> = match config.backend.as_str() {
        "sqlite" => Arc::new(SqliteIndex::open(dir).await?),
        "flatfile" => Arc::new(FlatFileIndex::open(dir).await?),
        "memory" => Arc::new(InMemoryIndex::new()),
        other => {
            return Err(RagError::index(format!("unknown index backend '{}'", other)));
        }
    };

    let state = if index.meta().await?.is_some() {
        IndexState::Existing
    } else {
        IndexState::Created
    };
    info!(backend = index.backend(), path = %dir.display(), ?state, "opened index");
    Ok(OpenedIndex { index, state })
}
