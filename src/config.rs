//! TOML configuration.
//!
//! Every section and key is optional; omitted values fall back to the
//! defaults below. See `config/petcare.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use petcare_rag_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use petcare_rag_core::prompt::PromptTemplate;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub knowledge_base: KnowledgeBaseConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_kb_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            directory: default_kb_directory(),
            include_globs: default_include_globs(),
            recursive: false,
        }
    }
}

fn default_kb_directory() -> PathBuf {
    PathBuf::from("knowledge_base")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `sqlite`, `flatfile`, or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub sync_on_startup: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_index_path(),
            sync_on_startup: true,
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("index")
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, or a compatible proxy).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "embedding-001".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
    /// Prompt override; must contain `{context}` and `{question}`.
    #[serde(default)]
    pub template: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
            max_prompt_chars: default_max_prompt_chars(),
            template: None,
        }
    }
}

fn default_generation_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_max_prompt_chars() -> usize {
    30_000
}

impl GenerationConfig {
    pub fn prompt_template(&self) -> Result<PromptTemplate> {
        match &self.template {
            Some(t) => PromptTemplate::new(t.as_str()).context("Invalid generation.template"),
            None => Ok(PromptTemplate::default()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shown to end users when an answer cannot be produced.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_fallback_message() -> String {
    "Sorry, I can't answer that right now. Please try again a little later.".to_string()
}

/// Load and validate configuration. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.knowledge_base.include_globs.is_empty() {
        bail!("knowledge_base.include_globs must not be empty");
    }

    match config.index.backend.as_str() {
        "sqlite" | "flatfile" | "memory" => {}
        other => bail!(
            "Unknown index backend: '{}'. Must be sqlite, flatfile, or memory.",
            other
        ),
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if config.retrieval.k == 0 {
        bail!("retrieval.k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "gemini" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be gemini, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        bail!("embedding.timeout_secs must be > 0");
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "gemini" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be gemini, openai, or ollama.",
            other
        ),
    }
    if config.generation.model.trim().is_empty() {
        bail!("generation.model must not be empty");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if config.generation.timeout_secs == 0 {
        bail!("generation.timeout_secs must be > 0");
    }
    config.generation.prompt_template()?;

    Ok(())
}
