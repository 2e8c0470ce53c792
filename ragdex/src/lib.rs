//! # ragdex
//!
//! Retrieval core for RAG applications: split documents into linked chunks,
//! embed and store them in an in-memory vector index, and retrieve the most
//! relevant chunks for a query.
//!
//! ## Components
//!
//! - [`RecursiveChunker`] / [`ContextualChunker`]: provenance-preserving text splitters
//! - [`VectorIndex`]: embedding matrix with content dedup, NaN-safe cosine search,
//!   and lockstep removal
//! - [`IndexRetriever`]: query embedding plus index search
//! - [`QueryFusionRetriever`]: paraphrase queries across retrievers, merged by score or RRF
//! - [`RagPipeline`]: ingest and query orchestration, including multi-source ingestion
//! - [`ToolRegistry`] / [`RetrievalTool`]: explicit tool dispatch for agents
//!
//! Embedding and language-model backends plug in through [`EmbeddingProvider`]
//! and [`LlmProvider`]. The `openai` feature adds REST implementations of both.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragdex::{Document, RagConfig, RagPipeline, RecursiveChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .splitter(Arc::new(RecursiveChunker::new(512, 100)))
//!     .build()?;
//!
//! pipeline.ingest(&[Document::new("doc1", "Apple reported record revenue.")]).await?;
//! let hits = pipeline.query("apple revenue").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod index;
pub mod llm;
pub mod matrix;
pub mod merge;
pub mod persist;
pub mod pipeline;
pub mod retriever;
pub mod telemetry;
pub mod tool;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{
    CONTEXT_DELIMITER, Chunker, ContextFailurePolicy, ContextualChunker, DocumentSplitter,
    RecursiveChunker,
};
pub use config::{FusionConfig, FusionMode, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, MetadataFilter, Query, content_hash};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use fusion::{QueryFusionRetriever, QueryFusionRetrieverBuilder, fuse_results};
pub use index::VectorIndex;
pub use llm::{LlmProvider, Message, Role};
pub use matrix::{EmbeddingMatrix, cosine_similarity};
pub use merge::merge_as_available;
pub use persist::IndexSnapshot;
pub use pipeline::{DocumentStream, IngestReport, RagPipeline, RagPipelineBuilder};
pub use retriever::{IndexRetriever, Retriever};
pub use tool::{RetrievalTool, Tool, ToolRegistry};

#[cfg(feature = "openai")]
pub use openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
