//! Embedding and generation capability traits, plus vector utilities.
//!
//! Defines the [`EmbeddingProvider`] and [`GenerationProvider`] traits that
//! every backend implements, and pure helpers for vector validation,
//! serialization, and similarity.
//!
//! Concrete providers (Gemini, OpenAI, Ollama, fastembed) live in the
//! `petcare-rag` app crate.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Converts text into fixed-dimension vectors.
///
/// Implementations must be safe to call concurrently. Vectors returned for
/// one call must all have the same length, and that length must not change
/// over the provider's lifetime.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"embedding-001"`).
    fn model_name(&self) -> &str;
    /// Returns the configured dimensionality, or `0` if only known after the
    /// first call.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Turns a prompt into text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vectors = provider.embed(&[text.to_string()]).await?;
    validate_vectors(&vectors, 1)?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| RagError::EmbeddingUnavailable("empty embedding response".to_string()))
}

/// Check that a provider response holds `expected` non-empty vectors of one
/// shared length, returning that length.
pub fn validate_vectors(vectors: &[Vec<f32>], expected: usize) -> Result<usize> {
    if vectors.len() != expected {
        return Err(RagError::EmbeddingUnavailable(format!(
            "provider returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    if expected > 0 && dims == 0 {
        return Err(RagError::EmbeddingUnavailable(
            "provider returned an empty vector".to_string(),
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(RagError::EmbeddingUnavailable(format!(
            "provider returned vectors of mixed length ({} and {})",
            dims,
            bad.len()
        )));
    }
    Ok(dims)
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// # Example
///
/// ```rust
/// use petcare_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider(Vec<Vec<f32>>);

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_validate_vectors() {
        assert_eq!(validate_vectors(&[vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap(), 2);
        assert!(validate_vectors(&[vec![1.0]], 2).is_err());
        assert!(validate_vectors(&[vec![]], 1).is_err());
        assert!(validate_vectors(&[vec![1.0], vec![1.0, 2.0]], 2).is_err());
        assert_eq!(validate_vectors(&[], 0).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embed_query_rejects_malformed_response() {
        let provider = FixedProvider(vec![]);
        let err = embed_query(&provider, "walks").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingUnavailable(_)));

        let provider = FixedProvider(vec![vec![0.5, 0.5]]);
        assert_eq!(embed_query(&provider, "walks").await.unwrap(), vec![0.5, 0.5]);
    }
}
