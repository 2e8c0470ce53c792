//! Tools for agent integration and the registry that dispatches them.
//!
//! Tools are registered explicitly at startup in a [`ToolRegistry`] that
//! maps a name to its schema and its `invoke` entry point.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragdex::{RetrievalTool, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Arc::new(RetrievalTool::new(retriever, 5)))?;
//!
//! // The agent calls the tool with:
//! // { "query": "How do I configure X?", "top_k": 3, "filter": { "topic": "setup" } }
//! let hits = registry.invoke("rag_search", args).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::document::{MetadataFilter, Query};
use crate::error::{RagError, Result};
use crate::retriever::Retriever;

/// A callable tool with a JSON-schema description of its arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the `args` object accepted by [`invoke`](Tool::invoke).
    fn parameters_schema(&self) -> Value;

    async fn invoke(&self, args: Value) -> Result<Value>;
}

/// Name → tool lookup, built once and then used for dispatch.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ToolError`] if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RagError::ToolError(format!("tool '{name}' is already registered")));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    /// Function declarations for every tool, sorted by name.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }

    /// Dispatch a call by tool name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ToolError`] for an unknown name, otherwise whatever
    /// the tool returns.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RagError::ToolError(format!("unknown tool '{name}'")))?;
        tool.invoke(args).await
    }
}

/// A retrieval tool over any [`Retriever`].
///
/// Accepts a required `query` string, an optional `top_k`, and an optional
/// `filter` object of exact-match metadata pairs. Returns a JSON array of
/// `{id, document_id, text, score, metadata}` objects, best first.
pub struct RetrievalTool {
    retriever: Arc<dyn Retriever>,
    default_top_k: usize,
}

impl RetrievalTool {
    /// Create a new `RetrievalTool`.
    ///
    /// `default_top_k` is used when the caller does not pass `top_k`.
    pub fn new(retriever: Arc<dyn Retriever>, default_top_k: usize) -> Self {
        Self { retriever, default_top_k }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        "rag_search"
    }

    fn description(&self) -> &str {
        "Search a knowledge base for relevant documents given a query"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant documents"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of results to return. Uses the tool default if omitted."
                },
                "filter": {
                    "type": "object",
                    "description": "Metadata key/value pairs that every result must match exactly.",
                    "additionalProperties": { "type": "string" }
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RagError::ToolError("missing required 'query' parameter".into()))?;

        let top_k = args
            .get("top_k")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(self.default_top_k);

        let filter = match args.get("filter") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let pairs: HashMap<String, String> = serde_json::from_value(value.clone())
                    .map_err(|e| RagError::ToolError(format!("invalid 'filter' parameter: {e}")))?;
                Some(MetadataFilter::from(pairs))
            }
        };

        info!(query, top_k, filtered = filter.is_some(), "rag_search tool called");

        let results =
            self.retriever.retrieve(&Query::new(query), top_k, filter.as_ref()).await.map_err(
                |e| {
                    error!(error = %e, "rag_search failed");
                    RagError::ToolError(format!("RAG search failed: {e}"))
                },
            )?;

        Ok(Value::Array(
            results
                .into_iter()
                .map(|chunk| {
                    json!({
                        "id": chunk.id,
                        "document_id": chunk.document_id,
                        "text": chunk.text,
                        "score": chunk.score,
                        "metadata": chunk.metadata,
                    })
                })
                .collect(),
        ))
    }
}
