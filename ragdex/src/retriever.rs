//! Retriever trait and the index-backed retriever.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, MetadataFilter, Query};
use crate::error::Result;
use crate::index::VectorIndex;

/// Something that turns a query into a ranked list of chunks.
///
/// Results are ordered best first and carry [`Chunk::score`].
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Chunk>>;
}

/// Retrieves from a shared [`VectorIndex`].
///
/// Embeds the query with the index's own provider, then returns
/// [`VectorIndex::search`] unchanged. Ranking belongs to the index.
#[derive(Debug, Clone)]
pub struct IndexRetriever {
    index: Arc<RwLock<VectorIndex>>,
}

impl IndexRetriever {
    pub fn new(index: Arc<RwLock<VectorIndex>>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<RwLock<VectorIndex>> {
        &self.index
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Chunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        // The lock is not held across the provider call.
        let provider = self.index.read().await.provider().clone();
        let embedding = provider.embed(&query.text).await?;

        let results = self.index.read().await.search(&embedding, top_k, filter);
        debug!(query = %query.text, top_k, returned = results.len(), "retrieved from index");
        Ok(results)
    }
}
