#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use petcare_rag::config::Config;
use petcare_rag::pipeline::{PipelineOptions, RagPipeline, Startup};
use petcare_rag::store::open_index;
use petcare_rag_core::embedding::{EmbeddingProvider, GenerationProvider};
use petcare_rag_core::{RagError, Result};

pub const DIMS: usize = 256;

/// Bag-of-words embedder: hashes crude word stems into a fixed-size vector.
/// Texts sharing words end up close under cosine similarity.
pub struct WordHashEmbedder {
    calls: AtomicUsize,
}

impl WordHashEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn stem(word: &str) -> &str {
    if word.len() > 3 {
        word.strip_suffix('s').unwrap_or(word)
    } else {
        word
    }
}

fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in text.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMS];
    let lower = text.to_lowercase();
    for word in lower.split(|c: char| !c.is_alphanumeric()) {
        if word.len() < 3 {
            continue;
        }
        vector[(fnv1a(stem(word)) % DIMS as u64) as usize] += 1.0;
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    fn model_name(&self) -> &str {
        "word-hash"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| word_vector(t)).collect())
    }
}

/// Never answers.
pub struct StallingEmbedder;

#[async_trait]
impl EmbeddingProvider for StallingEmbedder {
    fn model_name(&self) -> &str {
        "stalling"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        std::future::pending().await
    }
}

/// Reports the embedding service as unreachable.
pub struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    fn model_name(&self) -> &str {
        "word-hash"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingUnavailable("connection refused".to_string()))
    }
}

/// Records every prompt and replies with a fixed answer.
pub struct RecordingGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation("model offline".to_string()))
    }
}

pub fn write_kb(dir: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

/// Config rooted in `root`: knowledge base in `root/kb`, index in
/// `root/index`.
pub fn config(root: &Path, backend: &str) -> Config {
    let mut config = Config::default();
    config.knowledge_base.directory = root.join("kb");
    config.index.backend = backend.to_string();
    config.index.path = root.join("index");
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    config
}

pub async fn open_pipeline(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
) -> Result<RagPipeline> {
    open_pipeline_with(config, Startup::Prepare, embedder, generator).await
}

pub async fn open_pipeline_with(
    config: &Config,
    startup: Startup,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
) -> Result<RagPipeline> {
    let mut options = PipelineOptions::from_config(config).unwrap();
    options.startup = startup;
    let opened = open_index(&config.index).await?;
    RagPipeline::open(options, opened, embedder, generator).await
}
