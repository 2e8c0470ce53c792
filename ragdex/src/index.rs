//! In-memory vector index with content deduplication and cosine search.
//!
//! [`VectorIndex`] keeps three pieces of state in lockstep:
//!
//! - the stored [`Chunk`]s, in insertion order
//! - an [`EmbeddingMatrix`] whose row `i` is the embedding of chunk `i`
//! - the set of content hashes used to skip duplicate text
//!
//! Only [`insert`](VectorIndex::insert) and the `remove*` methods mutate the
//! index, and both check that item count and row count agree afterwards.
//! Search is read-only. The index is single-writer; wrap it in a
//! `tokio::sync::RwLock` to share it.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::document::{Chunk, MetadataFilter, content_hash};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::matrix::{EmbeddingMatrix, cosine_similarity};

/// Map a raw similarity onto a totally ordered ranking key.
///
/// `NaN` becomes `f32::NEG_INFINITY`; `-0.0` becomes `0.0` so that
/// `total_cmp` treats both zeros as a tie.
pub(crate) fn rank_score(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else if score == 0.0 {
        0.0
    } else {
        score
    }
}

/// An in-memory vector index bound to one [`EmbeddingProvider`].
///
/// # Example
///
/// ```rust,ignore
/// use ragdex::VectorIndex;
///
/// let mut index = VectorIndex::new(Arc::new(my_embedder));
/// let positions = index.insert(chunks).await?;
/// let query = my_embedder.embed("apple revenue").await?;
/// let hits = index.search(&query, 5, None);
/// ```
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    pub(crate) matrix: EmbeddingMatrix,
    pub(crate) items: Vec<Chunk>,
    pub(crate) hashes: HashSet<String>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.matrix.dimensions())
            .field("len", &self.items.len())
            .field("hashes", &self.hashes.len())
            .finish()
    }
}

impl VectorIndex {
    /// Create an empty index. Row width is taken from `provider.dimensions()`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dimensions = provider.dimensions();
        Self {
            provider,
            matrix: EmbeddingMatrix::new(dimensions),
            items: Vec::new(),
            hashes: HashSet::new(),
        }
    }

    /// The embedding provider bound to this index.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn dimensions(&self) -> usize {
        self.matrix.dimensions()
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored chunks in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.items
    }

    pub fn get(&self, position: usize) -> Option<&Chunk> {
        self.items.get(position)
    }

    /// The embedding row for the chunk at `position`.
    pub fn embedding(&self, position: usize) -> Option<&[f32]> {
        self.matrix.row(position)
    }

    /// Returns `true` if a chunk with the same text has been inserted and not removed.
    pub fn contains(&self, chunk: &Chunk) -> bool {
        self.contains_text(&chunk.text)
    }

    pub fn contains_text(&self, text: &str) -> bool {
        self.hashes.contains(&content_hash(text))
    }

    /// Insert chunks, skipping any whose text is already indexed.
    ///
    /// Duplicates are detected by content hash, both against the index and
    /// within `chunks` itself (the first occurrence wins). Surviving chunks are
    /// embedded with a single [`embed_batch`](EmbeddingProvider::embed_batch)
    /// call and appended in order.
    ///
    /// Returns the positions assigned to the inserted chunks; skipped
    /// duplicates have no entry.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexError`] if the provider reports zero
    /// dimensions, the provider's error if embedding fails, or
    /// [`RagError::EmbeddingError`] if the provider returns the wrong number
    /// of vectors or vectors of the wrong width. The index is unchanged on error.
    pub async fn insert(&mut self, chunks: Vec<Chunk>) -> Result<Vec<usize>> {
        if self.dimensions() == 0 {
            return Err(RagError::IndexError(
                "embedding provider reports zero dimensions".to_string(),
            ));
        }

        let offered = chunks.len();
        let mut batch_hashes = HashSet::new();
        let mut survivors = Vec::with_capacity(offered);
        let mut new_hashes = Vec::with_capacity(offered);
        for mut chunk in chunks {
            let hash = chunk.content_hash();
            if self.hashes.contains(&hash) || !batch_hashes.insert(hash.clone()) {
                continue;
            }
            chunk.score = None;
            survivors.push(chunk);
            new_hashes.push(hash);
        }
        let skipped = offered - survivors.len();

        if survivors.is_empty() {
            debug!(offered, skipped, "nothing to insert");
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = survivors.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.provider.embed_batch_checked(&texts).await?;

        let start = self.items.len();
        self.matrix.extend_rows(embeddings);
        self.items.extend(survivors);
        self.hashes.extend(new_hashes);
        self.assert_aligned();

        let inserted = self.items.len() - start;
        info!(inserted, skipped, total = self.items.len(), "inserted chunks into index");
        Ok((start..self.items.len()).collect())
    }

    /// Rank stored chunks by cosine similarity to `query`.
    ///
    /// A similarity that comes out as `NaN` (zero-norm vectors, width
    /// mismatch) ranks as `f32::NEG_INFINITY`, and `-0.0` as `0.0`. Ties keep
    /// insertion order.
    /// Returns at most `top_k` chunks with [`Chunk::score`] set; an empty
    /// index or `top_k == 0` yields an empty `Vec`.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<Chunk> {
        if top_k == 0 || self.items.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .matrix
            .iter_rows()
            .zip(&self.items)
            .enumerate()
            .filter(|(_, (_, item))| filter.is_none_or(|f| f.matches(&item.metadata)))
            .map(|(i, (row, _))| (i, rank_score(cosine_similarity(query, row))))
            .collect();

        // Stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        debug!(top_k, returned = scored.len(), "index search");

        scored
            .into_iter()
            .map(|(i, score)| {
                let mut chunk = self.items[i].clone();
                chunk.score = Some(score);
                chunk
            })
            .collect()
    }

    /// Remove the chunks at `positions`, compacting rows and items together.
    ///
    /// Out-of-range and repeated positions are ignored. Content hashes of
    /// removed chunks are forgotten, so the same text can be inserted again.
    /// Returns the number of chunks actually removed.
    pub fn remove(&mut self, positions: &[usize]) -> usize {
        let mut keep = vec![true; self.items.len()];
        let mut removed = 0;
        for &position in positions {
            if let Some(slot) = keep.get_mut(position) {
                if *slot {
                    *slot = false;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.compact(&keep);
            info!(removed, total = self.items.len(), "removed chunks from index");
        }
        removed
    }

    /// Remove chunks by chunk id. Unknown ids are ignored.
    pub fn remove_ids(&mut self, ids: &[&str]) -> usize {
        let wanted: HashSet<&str> = ids.iter().copied().collect();
        let keep: Vec<bool> = self.items.iter().map(|c| !wanted.contains(c.id.as_str())).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            self.compact(&keep);
            info!(removed, total = self.items.len(), "removed chunks from index");
        }
        removed
    }

    fn compact(&mut self, keep: &[bool]) {
        self.matrix.retain_rows(keep);
        let hashes = &mut self.hashes;
        let mut flags = keep.iter();
        self.items.retain(|item| {
            let kept = flags.next().copied().unwrap_or(true);
            if !kept {
                hashes.remove(&item.content_hash());
            }
            kept
        });
        self.assert_aligned();
    }

    pub(crate) fn assert_aligned(&self) {
        assert_eq!(
            self.items.len(),
            self.matrix.rows(),
            "vector index corrupted: stored items and embedding rows diverged"
        );
    }
}
