//! Data types for documents, chunks, queries, and metadata filters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// SHA-256 hex digest of the text, used as the content identity.
    pub fn content_hash(&self) -> String {
        content_hash(&self.text)
    }
}

/// A contiguous segment of a [`Document`].
///
/// Chunks of one document form a doubly-linked sequence through
/// `prev_chunk_id` / `next_chunk_id`, in left-to-right text order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Metadata copied from the parent document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The preceding chunk of the same document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_chunk_id: Option<String>,
    /// The following chunk of the same document, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_chunk_id: Option<String>,
    /// Similarity score, set only on search and fusion results.
    #[serde(skip)]
    pub score: Option<f32>,
}

impl Chunk {
    /// Create an unlinked chunk belonging to `document_id`.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
            document_id: document_id.into(),
            prev_chunk_id: None,
            next_chunk_id: None,
            score: None,
        }
    }

    /// SHA-256 hex digest of the text, used for deduplication.
    pub fn content_hash(&self) -> String {
        content_hash(&self.text)
    }
}

/// A retrieval query. Embedded on demand and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// The query text.
    pub text: String,
    /// Free-form metadata carried alongside the query.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Query {
    /// Create a query with empty metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: HashMap::new() }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Exact-match metadata filter applied during search.
///
/// A chunk matches when every key in the filter is present in its metadata
/// with an equal value. An empty filter matches every chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MetadataFilter {
    required: HashMap<String, String>,
}

impl MetadataFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if no constraints are set.
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// Check a metadata map against the filter.
    pub fn matches(&self, metadata: &HashMap<String, String>) -> bool {
        self.required.iter().all(|(k, v)| metadata.get(k) == Some(v))
    }
}

impl From<HashMap<String, String>> for MetadataFilter {
    fn from(required: HashMap<String, String>) -> Self {
        Self { required }
    }
}

/// SHA-256 hex digest of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
