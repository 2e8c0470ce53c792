//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the ingest-and-query workflow by composing
//! an [`EmbeddingProvider`], a [`DocumentSplitter`], and a shared
//! [`VectorIndex`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragdex::{RagPipeline, RagConfig, RecursiveChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .splitter(Arc::new(RecursiveChunker::new(512, 100)))
//!     .build()?;
//!
//! pipeline.ingest(&documents).await?;
//! let results = pipeline.query("search query").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::chunking::DocumentSplitter;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, MetadataFilter, Query};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::merge::merge_as_available;
use crate::retriever::{IndexRetriever, Retriever};

/// A source of documents for [`RagPipeline::ingest_sources`].
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// Outcome of [`RagPipeline::ingest_sources`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents received from all sources.
    pub documents: usize,
    /// Chunks added to the index.
    pub inserted: usize,
    /// Documents whose splitting or embedding failed.
    pub failed: usize,
}

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (split → embed → store) and query
/// execution (embed → search → threshold). Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    splitter: Arc<dyn DocumentSplitter>,
    index: Arc<RwLock<VectorIndex>>,
    retriever: IndexRetriever,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The shared index. Other retrievers may be built over it.
    pub fn index(&self) -> &Arc<RwLock<VectorIndex>> {
        &self.index
    }

    /// A retriever over this pipeline's index.
    pub fn retriever(&self) -> &IndexRetriever {
        &self.retriever
    }

    /// Split documents and insert the resulting chunks in one batch.
    ///
    /// Returns the index positions of the inserted chunks. Chunks whose text
    /// is already indexed are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if splitting or embedding fails.
    /// Nothing is inserted in that case.
    ///
    /// The index write lock is held while the chunks are embedded, so
    /// concurrent queries against the same index wait for the embedding
    /// provider to answer. Splitting happens before the lock is taken.
    pub async fn ingest(&self, documents: &[Document]) -> Result<Vec<usize>> {
        let chunks = self.splitter.split_documents(documents).await.map_err(|e| {
            error!(documents = documents.len(), error = %e, "splitting failed during ingestion");
            RagError::PipelineError(format!("splitting failed: {e}"))
        })?;
        if chunks.is_empty() {
            info!(documents = documents.len(), chunk_count = 0, "ingested documents (empty)");
            return Ok(Vec::new());
        }

        let chunk_count = chunks.len();
        let positions = self.index.write().await.insert(chunks).await.map_err(|e| {
            error!(documents = documents.len(), error = %e, "insert failed during ingestion");
            RagError::PipelineError(format!("insert failed: {e}"))
        })?;

        info!(
            documents = documents.len(),
            chunk_count,
            inserted = positions.len(),
            "ingested documents"
        );
        Ok(positions)
    }

    /// Ingest documents from several sources as they arrive.
    ///
    /// Sources are merged with [`merge_as_available`]. A document that fails
    /// to split or embed is logged and counted in [`IngestReport::failed`]
    /// without stopping the other sources.
    ///
    /// # Errors
    ///
    /// Returns the last source error when every source fails, which includes
    /// a single source that fails. Documents received before that point stay
    /// ingested.
    pub async fn ingest_sources(&self, sources: Vec<DocumentStream>) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut merged = merge_as_available(sources);

        while let Some(document) = merged.next().await {
            let document = document?;
            report.documents += 1;
            match self.ingest(std::slice::from_ref(&document)).await {
                Ok(positions) => report.inserted += positions.len(),
                Err(e) => {
                    warn!(document.id = %document.id, error = %e, "skipping document");
                    report.failed += 1;
                }
            }
        }

        info!(
            documents = report.documents,
            inserted = report.inserted,
            failed = report.failed,
            "source ingestion completed"
        );
        Ok(report)
    }

    /// Query the index with the configured `top_k`, dropping results below
    /// `similarity_threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the query embedding fails.
    pub async fn query(&self, query: &str) -> Result<Vec<Chunk>> {
        self.query_with(&Query::new(query), self.config.top_k, None).await
    }

    /// Query with an explicit `top_k` and optional metadata filter.
    pub async fn query_with(
        &self,
        query: &Query,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Chunk>> {
        let results = self.retriever.retrieve(query, top_k, filter).await.map_err(|e| {
            error!(error = %e, "retrieval failed during query");
            RagError::PipelineError(format!("query failed: {e}"))
        })?;

        let threshold = self.config.similarity_threshold;
        let filtered: Vec<Chunk> =
            results.into_iter().filter(|c| c.score.is_some_and(|s| s >= threshold)).collect();

        info!(result_count = filtered.len(), "query completed");
        Ok(filtered)
    }

    /// Persist the index to `path`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.index.read().await.save(path).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config` and `splitter` are required, plus either an embedding provider
/// (a fresh index is created) or an existing index.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .splitter(Arc::new(RecursiveChunker::new(512, 100)))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    splitter: Option<Arc<dyn DocumentSplitter>>,
    index: Option<Arc<RwLock<VectorIndex>>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for a new index.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the document splitter.
    pub fn splitter(mut self, splitter: Arc<dyn DocumentSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Use an existing (for example, reloaded) index instead of a new one.
    pub fn index(mut self, index: Arc<RwLock<VectorIndex>>) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let splitter = self
            .splitter
            .ok_or_else(|| RagError::ConfigError("splitter is required".to_string()))?;
        let index = match (self.index, self.embedding_provider) {
            (Some(index), _) => index,
            (None, Some(provider)) => Arc::new(RwLock::new(VectorIndex::new(provider))),
            (None, None) => {
                return Err(RagError::ConfigError(
                    "embedding_provider or index is required".to_string(),
                ));
            }
        };

        Ok(RagPipeline { config, splitter, retriever: IndexRetriever::new(index.clone()), index })
    }
}
