//! Document splitting strategies.
//!
//! This module provides two traits and two implementations:
//!
//! - [`Chunker`]: synchronous, pure text splitting
//! - [`DocumentSplitter`]: async splitting, for strategies that call a model
//! - [`RecursiveChunker`]: splits hierarchically by paragraphs, lines, sentences, then words
//! - [`ContextualChunker`]: recursive splitting plus an LLM-written context prefix per chunk
//!
//! Every strategy produces, per document, a sequence of [`Chunk`]s in text
//! order with fresh ids, the document's metadata and id, and
//! `prev_chunk_id` / `next_chunk_id` links between neighbours.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::Result;
use crate::llm::{LlmProvider, Message};

/// Separators tried in order, coarsest first.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// Placed between the generated context and the original chunk text.
pub const CONTEXT_DELIMITER: &str = "\n\n";

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into linked chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split several documents, concatenating their chunk sequences in input order.
    fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.chunk(d)).collect()
    }
}

/// Async splitting, used by the pipeline.
///
/// Strategies that only manipulate text delegate to [`Chunker`]; strategies
/// that call a language model do their I/O here.
#[async_trait]
pub trait DocumentSplitter: Send + Sync {
    async fn split_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>>;
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// Sizes are measured in characters. Text longer than `chunk_size` is split at
/// the coarsest separator it contains; pieces that are still too long are split
/// again with the finer separators, and a hard character cut is the last
/// resort. Small neighbouring pieces are merged back up to `chunk_size`, and
/// up to `chunk_overlap` characters of trailing pieces are repeated at the
/// start of the next chunk.
///
/// # Example
///
/// ```rust,ignore
/// use ragdex::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(512, 100);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk (at least 1)
    /// * `chunk_overlap`: characters repeated between consecutive chunks
    ///   (clamped below `chunk_size`)
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }

    /// Build from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split raw text into trimmed, non-empty pieces of at most `chunk_size` characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        split_recursive(text, self.chunk_size, self.chunk_overlap, &SEPARATORS)
            .into_iter()
            .filter_map(|piece| {
                let trimmed = piece.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect()
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }
        link_chunks(document, self.split_text(&document.text))
    }
}

#[async_trait]
impl DocumentSplitter for RecursiveChunker {
    async fn split_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        Ok(self.split(documents))
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some(position) = separators.iter().position(|sep| text.contains(*sep)) else {
        return split_by_size(text, chunk_size, chunk_overlap);
    };
    let separator = separators[position];
    let finer = &separators[position + 1..];

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) <= chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
            fitting.clear();
        }
        chunks.extend(split_recursive(piece, chunk_size, chunk_overlap, finer));
    }
    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
    }
    chunks
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Greedily join pieces (each no longer than `chunk_size`) into chunks.
///
/// When a chunk is emitted, the trailing pieces that fit within
/// `chunk_overlap` characters seed the next one.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);
        if total + len > chunk_size && !window.is_empty() {
            chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
            while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                let Some((_, dropped)) = window.pop_front() else { break };
                total -= dropped;
            }
        }
        window.push_back((piece, len));
        total += len;
    }

    if !window.is_empty() {
        chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
    }
    chunks
}

/// Character windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let bounds: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_count = bounds.len() - 1;
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < char_count {
        let end = (start + chunk_size).min(char_count);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        if end == char_count {
            break;
        }
        start += step;
    }
    chunks
}

/// Turn one document's texts into chunks with fresh ids and neighbour links.
fn link_chunks(document: &Document, texts: Vec<String>) -> Vec<Chunk> {
    let ids: Vec<String> = texts.iter().map(|_| Uuid::new_v4().to_string()).collect();
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: ids[i].clone(),
            text,
            metadata: document.metadata.clone(),
            document_id: document.id.clone(),
            prev_chunk_id: i.checked_sub(1).map(|p| ids[p].clone()),
            next_chunk_id: ids.get(i + 1).cloned(),
            score: None,
        })
        .collect()
}

/// What [`ContextualChunker`] does when context generation fails for a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextFailurePolicy {
    /// Log a warning and keep the chunk without context.
    #[default]
    Fallback,
    /// Propagate the provider error; the whole split fails.
    Abort,
}

const CONTEXT_SYSTEM_PROMPT: &str = "You write short context statements that situate an \
excerpt within its source document to improve search retrieval. Answer with the context only.";

/// Recursive splitting plus a model-written context line for every chunk.
///
/// For each chunk the [`LlmProvider`] sees the whole document and the chunk
/// and returns a short situating context, which is prepended to the chunk
/// text separated by [`CONTEXT_DELIMITER`]. Calls for one document run
/// concurrently; ids, links and metadata are the same as for
/// [`RecursiveChunker`].
///
/// # Example
///
/// ```rust,ignore
/// use ragdex::{ContextFailurePolicy, ContextualChunker, DocumentSplitter, RecursiveChunker};
///
/// let splitter = ContextualChunker::new(RecursiveChunker::new(512, 64), llm)
///     .with_failure_policy(ContextFailurePolicy::Abort);
/// let chunks = splitter.split_documents(&docs).await?;
/// ```
pub struct ContextualChunker {
    inner: RecursiveChunker,
    llm: Arc<dyn LlmProvider>,
    policy: ContextFailurePolicy,
}

impl ContextualChunker {
    pub fn new(inner: RecursiveChunker, llm: Arc<dyn LlmProvider>) -> Self {
        Self { inner, llm, policy: ContextFailurePolicy::default() }
    }

    pub fn with_failure_policy(mut self, policy: ContextFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_policy(&self) -> ContextFailurePolicy {
        self.policy
    }

    async fn situate(&self, document: &Document, chunk: &Chunk) -> Result<String> {
        let messages = [
            Message::system(CONTEXT_SYSTEM_PROMPT),
            Message::user(format!(
                "<document>\n{}\n</document>\n\nHere is the chunk we want to situate within the \
                 whole document:\n<chunk>\n{}\n</chunk>\n\nGive a short, succinct context to \
                 situate this chunk within the overall document for the purposes of improving \
                 search retrieval of the chunk.",
                document.text, chunk.text
            )),
        ];
        self.llm.generate(&messages).await
    }

    async fn chunk_document(&self, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = self.inner.chunk(document);
        let contexts = join_all(chunks.iter().map(|chunk| self.situate(document, chunk))).await;

        for (chunk, context) in chunks.iter_mut().zip(contexts) {
            match context {
                Ok(context) => {
                    let context = context.trim();
                    if !context.is_empty() {
                        chunk.text = format!("{context}{CONTEXT_DELIMITER}{}", chunk.text);
                    }
                }
                Err(e) if self.policy == ContextFailurePolicy::Fallback => {
                    warn!(
                        document.id = %document.id,
                        chunk.id = %chunk.id,
                        error = %e,
                        "context generation failed, keeping chunk without context"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "contextualized document");
        Ok(chunks)
    }
}

#[async_trait]
impl DocumentSplitter for ContextualChunker {
    async fn split_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all = Vec::new();
        for document in documents {
            all.extend(self.chunk_document(document).await?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunker = RecursiveChunker::new(100, 10);
        assert_eq!(chunker.split_text("  hello world  "), vec!["hello world".to_string()]);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let chunker = RecursiveChunker::new(30, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let pieces = chunker.split_text(text);
        assert_eq!(pieces, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn overlap_repeats_trailing_words() {
        let chunker = RecursiveChunker::new(11, 4);
        let pieces = chunker.split_text("aaa bbb ccc ddd");
        assert_eq!(pieces, vec!["aaa bbb", "bbb ccc ddd"]);
    }

    #[test]
    fn hard_cut_respects_char_boundaries() {
        let pieces = split_by_size("ééééé", 2, 0);
        assert_eq!(pieces, vec!["éé", "éé", "é"]);
        let overlapped = split_by_size("abcdef", 4, 2);
        assert_eq!(overlapped, vec!["abcd", "cdef"]);
    }

    #[test]
    fn whitespace_document_yields_no_chunks() {
        let chunker = RecursiveChunker::new(10, 2);
        assert!(chunker.chunk(&Document::new("d", " \n\n ")).is_empty());
    }
}
