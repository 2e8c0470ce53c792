//! Multi-query, multi-retriever fusion.
//!
//! [`QueryFusionRetriever`] asks a language model for paraphrases of the
//! user's query, runs the original and every paraphrase against every
//! configured retriever concurrently, and merges the ranked lists with
//! [`fuse_results`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ragdex::{FusionMode, QueryFusionRetriever, Retriever};
//!
//! let fusion = QueryFusionRetriever::builder()
//!     .retriever(Arc::new(news_retriever))
//!     .retriever(Arc::new(filings_retriever))
//!     .llm(Arc::new(chat_model))
//!     .num_queries(3)
//!     .mode(FusionMode::ReciprocalRank)
//!     .build()?;
//!
//! let hits = fusion.retrieve(&"apple revenue".into(), 5, None).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::{FusionConfig, FusionMode};
use crate::document::{Chunk, MetadataFilter, Query};
use crate::error::{RagError, Result};
use crate::index::rank_score;
use crate::llm::{LlmProvider, Message};
use crate::retriever::Retriever;

/// Fuses results from several retrievers over several phrasings of a query.
pub struct QueryFusionRetriever {
    retrievers: Vec<Arc<dyn Retriever>>,
    llm: Option<Arc<dyn LlmProvider>>,
    config: FusionConfig,
}

impl QueryFusionRetriever {
    pub fn builder() -> QueryFusionRetrieverBuilder {
        QueryFusionRetrieverBuilder::default()
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Ask the LLM for up to `num_queries` alternative phrasings.
    ///
    /// Returns an empty list when generation is disabled.
    ///
    /// # Errors
    ///
    /// Propagates the provider error if the LLM call fails.
    pub async fn generate_queries(&self, query: &Query) -> Result<Vec<String>> {
        let num_queries = self.config.num_queries;
        let Some(llm) = self.llm.as_ref().filter(|_| num_queries > 0) else {
            return Ok(Vec::new());
        };

        let prompt = format!(
            "You are a helpful assistant that generates multiple search queries based on a \
             single input query. Generate {num_queries} search queries, one on each line, \
             related to the following input query:\nQuery: {}\nQueries:\n",
            query.text
        );
        let response = llm.generate(&[Message::user(prompt)]).await?;
        let queries = parse_generated_queries(&response, &query.text, num_queries);
        debug!(original = %query.text, generated = queries.len(), "generated fusion queries");
        Ok(queries)
    }
}

#[async_trait]
impl Retriever for QueryFusionRetriever {
    async fn retrieve(
        &self,
        query: &Query,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Chunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut queries = vec![query.clone()];
        queries.extend(
            self.generate_queries(query)
                .await?
                .into_iter()
                .map(|text| Query { text, metadata: query.metadata.clone() }),
        );

        // Retriever-major order; try_join_all keeps submission order.
        let jobs = self
            .retrievers
            .iter()
            .flat_map(|r| queries.iter().map(move |q| r.retrieve(q, top_k, filter)));
        let lists = try_join_all(jobs).await?;

        let fused = fuse_results(lists, self.config.mode, self.config.rrf_k, top_k);
        info!(
            queries = queries.len(),
            retrievers = self.retrievers.len(),
            mode = ?self.config.mode,
            returned = fused.len(),
            "fusion retrieval completed"
        );
        Ok(fused)
    }
}

/// Merge ranked lists into one list with unique ids and unique texts.
///
/// A chunk's identity is its id; a later chunk with a different id but the
/// same text folds into the first-seen one. Scores per mode:
///
/// - [`FusionMode::Simple`]: the best [`Chunk::score`] seen (missing or `NaN`
///   counts as `f32::NEG_INFINITY`, `-0.0` as `0.0`)
/// - [`FusionMode::ReciprocalRank`]: the sum of `1 / (rank + rrf_k)` over every
///   list the chunk appears in, with `rank` starting at 0
///
/// Output is sorted by fused score, ties in first-seen order, truncated to
/// `top_k`, with [`Chunk::score`] set to the fused score.
pub fn fuse_results(
    lists: Vec<Vec<Chunk>>,
    mode: FusionMode,
    rrf_k: f32,
    top_k: usize,
) -> Vec<Chunk> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut fused: Vec<(Chunk, f32)> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut by_text: HashMap<String, usize> = HashMap::new();

    for list in lists {
        for (rank, chunk) in list.into_iter().enumerate() {
            let contribution = rank_score(match mode {
                FusionMode::Simple => chunk.score.unwrap_or(f32::NAN),
                FusionMode::ReciprocalRank => 1.0 / (rank as f32 + rrf_k),
            });
            let hash = chunk.content_hash();
            match by_id.get(&chunk.id).or_else(|| by_text.get(&hash)).copied() {
                Some(slot) => {
                    let score = &mut fused[slot].1;
                    match mode {
                        FusionMode::Simple => *score = score.max(contribution),
                        FusionMode::ReciprocalRank => *score += contribution,
                    }
                    by_id.entry(chunk.id).or_insert(slot);
                }
                None => {
                    let slot = fused.len();
                    by_id.insert(chunk.id.clone(), slot);
                    by_text.insert(hash, slot);
                    fused.push((chunk, contribution));
                }
            }
        }
    }

    for entry in &mut fused {
        entry.1 = rank_score(entry.1);
    }
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused.truncate(top_k);
    fused
        .into_iter()
        .map(|(mut chunk, score)| {
            chunk.score = Some(score);
            chunk
        })
        .collect()
}

/// Pull distinct queries out of a one-per-line LLM response.
fn parse_generated_queries(response: &str, original: &str, limit: usize) -> Vec<String> {
    let original = original.trim();
    let mut seen = HashSet::new();
    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty() && *line != original)
        .filter(|line| seen.insert(line.to_string()))
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(['-', '*', '•']) {
        return rest.trim_start();
    }
    let digits = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(['.', ')']) {
            return rest.trim_start();
        }
    }
    line
}

/// Builder for [`QueryFusionRetriever`].
#[derive(Default)]
pub struct QueryFusionRetrieverBuilder {
    retrievers: Vec<Arc<dyn Retriever>>,
    llm: Option<Arc<dyn LlmProvider>>,
    config: FusionConfig,
}

impl QueryFusionRetrieverBuilder {
    /// Add a retriever. At least one is required.
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retrievers.push(retriever);
        self
    }

    /// Set the model used to generate query paraphrases.
    pub fn llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace all fusion settings.
    pub fn config(mut self, config: FusionConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of paraphrases to generate; `0` searches with the original query only.
    pub fn num_queries(mut self, n: usize) -> Self {
        self.config.num_queries = n;
        self
    }

    pub fn mode(mut self, mode: FusionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn rrf_k(mut self, k: f32) -> Self {
        self.config.rrf_k = k;
        self
    }

    /// Build the retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no retriever was added, if
    /// paraphrases are requested without an LLM, or if `rrf_k` is invalid.
    pub fn build(self) -> Result<QueryFusionRetriever> {
        if self.retrievers.is_empty() {
            return Err(RagError::ConfigError("at least one retriever is required".to_string()));
        }
        if self.config.num_queries > 0 && self.llm.is_none() {
            return Err(RagError::ConfigError(
                "an llm is required when num_queries is greater than zero".to_string(),
            ));
        }
        self.config.validate()?;
        Ok(QueryFusionRetriever { retrievers: self.retrievers, llm: self.llm, config: self.config })
    }
}
