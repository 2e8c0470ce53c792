//! Saving and reloading a [`VectorIndex`].
//!
//! The on-disk form is a JSON [`IndexSnapshot`]. The embedding provider is not
//! persisted; the caller supplies one on load.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::matrix::EmbeddingMatrix;

/// Serializable state of a [`VectorIndex`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSnapshot {
    pub dimensions: usize,
    /// One row per entry of `items`, in the same order.
    pub embeddings: Vec<Vec<f32>>,
    pub items: Vec<Chunk>,
    pub content_hashes: Vec<String>,
}

impl VectorIndex {
    /// Capture the current state.
    pub fn snapshot(&self) -> IndexSnapshot {
        let mut content_hashes: Vec<String> = self.hashes.iter().cloned().collect();
        content_hashes.sort();
        IndexSnapshot {
            dimensions: self.matrix.dimensions(),
            embeddings: self.matrix.iter_rows().map(<[f32]>::to_vec).collect(),
            items: self.items.clone(),
            content_hashes,
        }
    }

    /// Rebuild an index from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the snapshot's rows and items
    /// disagree, a row has the wrong width, items are stored with zero
    /// dimensions, or the provider's dimensionality differs from the snapshot's.
    pub fn from_snapshot(
        snapshot: IndexSnapshot,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let IndexSnapshot { dimensions, embeddings, items, content_hashes } = snapshot;

        if provider.dimensions() != dimensions {
            return Err(RagError::IndexError(format!(
                "snapshot has {dimensions} dimensions but provider produces {}",
                provider.dimensions()
            )));
        }
        if dimensions == 0 && !items.is_empty() {
            return Err(RagError::IndexError(format!(
                "snapshot has {} items but zero dimensions",
                items.len()
            )));
        }
        if embeddings.len() != items.len() {
            return Err(RagError::IndexError(format!(
                "snapshot has {} embeddings for {} items",
                embeddings.len(),
                items.len()
            )));
        }
        if let Some(row) = embeddings.iter().position(|e| e.len() != dimensions) {
            return Err(RagError::IndexError(format!(
                "snapshot row {row} does not have {dimensions} dimensions"
            )));
        }

        let mut matrix = EmbeddingMatrix::new(dimensions);
        matrix.extend_rows(embeddings);
        let mut hashes: HashSet<String> = content_hashes.into_iter().collect();
        // Every stored item must stay deduplicated even if the hash list was trimmed.
        hashes.extend(items.iter().map(Chunk::content_hash));

        let mut index = VectorIndex::new(provider);
        index.matrix = matrix;
        index.items = items;
        index.hashes = hashes;
        index.assert_aligned();
        Ok(index)
    }

    /// Write the index to `path` as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec(&self.snapshot())?;
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), items = self.len(), "saved vector index");
        Ok(())
    }

    /// Load an index previously written by [`save`](Self::save).
    pub async fn load(path: impl AsRef<Path>, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)?;
        let index = Self::from_snapshot(snapshot, provider)?;
        info!(path = %path.display(), items = index.len(), "loaded vector index");
        Ok(index)
    }
}
