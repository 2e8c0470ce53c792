//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI, local models,
/// test stubs) behind a unified async interface. Providers are assumed to be
/// deterministic per input. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use ragdex::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Must return exactly one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Name used in errors and logs.
    fn name(&self) -> &str {
        "embedding provider"
    }

    /// [`embed_batch`](EmbeddingProvider::embed_batch), then verify the batch
    /// contract: one vector per input, each of [`dimensions`](EmbeddingProvider::dimensions) width.
    ///
    /// # Errors
    ///
    /// Propagates the provider error, or returns [`RagError::EmbeddingError`]
    /// if the returned batch breaks the contract.
    async fn embed_batch_checked(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.embed_batch(texts).await?;
        check_batch(self.name(), texts.len(), self.dimensions(), &embeddings)?;
        Ok(embeddings)
    }
}

/// Check that `embeddings` holds `expected` vectors of `dimensions` width.
pub fn check_batch(
    provider: &str,
    expected: usize,
    dimensions: usize,
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if embeddings.len() != expected {
        return Err(RagError::EmbeddingError {
            provider: provider.to_string(),
            message: format!("returned {} vectors for {expected} inputs", embeddings.len()),
        });
    }
    if let Some((i, bad)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != dimensions) {
        return Err(RagError::EmbeddingError {
            provider: provider.to_string(),
            message: format!(
                "vector {i} has {} dimensions, expected {dimensions}",
                bad.len()
            ),
        });
    }
    Ok(())
}
