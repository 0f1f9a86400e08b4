//! The RAG pipeline orchestrator.
//!
//! A [`RagPipeline`] is built once per process and shared behind an `Arc`.
//! Construction makes sure the index is ready before the first question:
//!
//! | Index on open | `sync_on_startup` | Action |
//! |---------------|-------------------|--------|
//! | missing or empty | any | scan + full build |
//! | present | `true` | scan + incremental sync |
//! | present | `false` | reuse as is |
//!
//! A present index must have been built with the configured embedding model.
//! Any failure during that step fails construction, and a failed startup
//! build leaves the index empty. After that, every
//! [`answer`](RagPipeline::answer) call is independent: retrieve, then
//! compose. [`respond`](RagPipeline::respond) is the same call with failures
//! folded into [`Reply::Unavailable`] for transports that must always reply.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use petcare_rag_core::chunk::ChunkParams;
use petcare_rag_core::embedding::{EmbeddingProvider, GenerationProvider};
use petcare_rag_core::models::{Chunk, IndexMeta};
use petcare_rag_core::prompt::PromptTemplate;
use petcare_rag_core::store::{check_model, VectorIndex};
use petcare_rag_core::{ErrorKind, Result};

use crate::compose::Composer;
use crate::config::{Config, KnowledgeBaseConfig};
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::index::{Indexer, SyncReport};
use crate::ingest;
use crate::retrieve::Retriever;
use crate::store::{open_index, IndexState, OpenedIndex};

/// The outcome handed to a transport: an answer, or a classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Unavailable(ErrorKind),
}

/// What construction does with the index before accepting questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Build a missing index, sync an existing one if configured.
    Prepare,
    /// Open the index as is; no scan, no embedding calls.
    Reuse,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub knowledge_base: KnowledgeBaseConfig,
    pub sync_on_startup: bool,
    pub startup: Startup,
    pub chunking: ChunkParams,
    pub k: usize,
    pub embed_batch_size: usize,
    pub embed_timeout: Duration,
    pub generation_timeout: Duration,
    pub max_prompt_chars: usize,
    pub template: PromptTemplate,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            knowledge_base: config.knowledge_base.clone(),
            sync_on_startup: config.index.sync_on_startup,
            startup: Startup::Prepare,
            chunking: ChunkParams {
                chunk_size: config.chunking.chunk_size,
                overlap: config.chunking.chunk_overlap,
            },
            k: config.retrieval.k,
            embed_batch_size: config.embedding.batch_size,
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            max_prompt_chars: config.generation.max_prompt_chars,
            template: config.generation.prompt_template()?,
        })
    }
}

pub struct RagPipeline {
    knowledge_base: KnowledgeBaseConfig,
    k: usize,
    index: Arc<dyn VectorIndex>,
    indexer: Indexer,
    retriever: Retriever,
    composer: Composer,
}

impl RagPipeline {
    /// Wire the pipeline around an opened index and the two capabilities,
    /// then prepare the index according to `options.startup`.
    pub async fn open(
        options: PipelineOptions,
        opened: OpenedIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        let index = opened.index;
        let model = embedder.model_name().to_string();
        let dims = embedder.dims();
        let pipeline = Self {
            knowledge_base: options.knowledge_base,
            k: options.k,
            indexer: Indexer::new(
                index.clone(),
                embedder.clone(),
                options.chunking,
                options.embed_batch_size,
                options.embed_timeout,
            ),
            retriever: Retriever::new(index.clone(), embedder, options.embed_timeout),
            composer: Composer::new(
                generator,
                options.template,
                options.max_prompt_chars,
                options.generation_timeout,
            ),
            index,
        };

        match (options.startup, opened.state, options.sync_on_startup) {
            (Startup::Reuse, _, _) => {
                info!("opened index without startup sync");
            }
            (Startup::Prepare, IndexState::Created, _) => {
                info!("no index found, building from knowledge base");
                match pipeline.rebuild().await {
                    Ok(report) => info!(%report, "index built"),
                    Err(e) => {
                        if let Err(clear_err) = pipeline.index.clear().await {
                            warn!(error = %clear_err, "could not discard partial index");
                        }
                        return Err(e);
                    }
                }
            }
            (Startup::Prepare, IndexState::Existing, true) => {
                check_model(pipeline.index.meta().await?.as_ref(), &model, dims)?;
                let report = pipeline.sync_knowledge_base().await?;
                info!(%report, "startup sync finished");
            }
            (Startup::Prepare, IndexState::Existing, false) => {
                check_model(pipeline.index.meta().await?.as_ref(), &model, dims)?;
                info!("reusing existing index, startup sync disabled");
            }
        }

        Ok(pipeline)
    }

    /// Open the configured index and providers, then [`open`](Self::open).
    pub async fn from_config(config: &Config, startup: Startup) -> anyhow::Result<Self> {
        let mut options = PipelineOptions::from_config(config)?;
        options.startup = startup;
        let opened = open_index(&config.index).await?;
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Ok(Self::open(options, opened, embedder, generator).await?)
    }

    /// Answer `question` from the knowledge base.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let chunks = self.retrieve(question).await?;
        self.composer.compose(question, &chunks).await
    }

    /// The chunks [`answer`](Self::answer) would ground its prompt on.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<Chunk>> {
        self.retriever.retrieve(question, self.k).await
    }

    /// [`answer`](Self::answer), with any failure logged and reduced to its
    /// kind.
    pub async fn respond(&self, question: &str) -> Reply {
        match self.answer(question).await {
            Ok(answer) => Reply::Answer(answer),
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "answer unavailable");
                Reply::Unavailable(e.kind())
            }
        }
    }

    /// Scan the knowledge base and index documents not yet in the index.
    pub async fn sync_knowledge_base(&self) -> Result<SyncReport> {
        let documents = ingest::scan(&self.knowledge_base)?;
        self.indexer.sync(&documents).await
    }

    /// Scan the knowledge base and rebuild the index from scratch.
    pub async fn rebuild(&self) -> Result<SyncReport> {
        let documents = ingest::scan(&self.knowledge_base)?;
        self.indexer.build(&documents).await
    }

    pub async fn record_count(&self) -> Result<usize> {
        self.index.count().await
    }

    pub async fn sources(&self) -> Result<BTreeSet<String>> {
        self.index.sources().await
    }

    pub async fn meta(&self) -> Result<Option<IndexMeta>> {
        self.index.meta().await
    }

    pub fn backend(&self) -> &'static str {
        self.index.backend()
    }
}
