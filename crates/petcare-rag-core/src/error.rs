//! Error taxonomy for the RAG pipeline.
//!
//! Every fallible pipeline operation returns [`RagError`]. The transport
//! layer should not match on messages: [`RagError::kind`] gives a stable,
//! serializable classification instead.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// A remote (or otherwise slow) capability the pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Embedding,
    Generation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Embedding => f.write_str("embedding"),
            Capability::Generation => f.write_str("generation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("ingestion failed for {}: {reason}", path.display())]
    Ingestion { path: PathBuf, reason: String },

    #[error("embedding capability unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("vector dimensionality mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding model mismatch: index was built with '{indexed}', active model is '{active}'")]
    ModelMismatch { indexed: String, active: String },

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("{capability} call timed out after {after:?}")]
    CapabilityTimeout {
        capability: Capability,
        after: Duration,
    },

    #[error("generation failed: {0}")]
    Generation(String),
}

/// Coarse classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Ingestion,
    EmbeddingUnavailable,
    EmbeddingMismatch,
    IndexUnavailable,
    CapabilityTimeout,
    Generation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Ingestion => "ingestion",
            ErrorKind::EmbeddingUnavailable => "embedding_unavailable",
            ErrorKind::EmbeddingMismatch => "embedding_mismatch",
            ErrorKind::IndexUnavailable => "index_unavailable",
            ErrorKind::CapabilityTimeout => "capability_timeout",
            ErrorKind::Generation => "generation",
        };
        f.write_str(s)
    }
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::Ingestion { .. } => ErrorKind::Ingestion,
            RagError::EmbeddingUnavailable(_) => ErrorKind::EmbeddingUnavailable,
            RagError::DimensionMismatch { .. } | RagError::ModelMismatch { .. } => {
                ErrorKind::EmbeddingMismatch
            }
            RagError::IndexUnavailable(_) => ErrorKind::IndexUnavailable,
            RagError::CapabilityTimeout { .. } => ErrorKind::CapabilityTimeout,
            RagError::Generation(_) => ErrorKind::Generation,
        }
    }

    pub fn ingestion(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        RagError::Ingestion {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn index(err: impl fmt::Display) -> Self {
        RagError::IndexUnavailable(err.to_string())
    }
}
