//! Language model provider trait.
//!
//! Only the contextual splitter and query fusion call a language model. Both
//! receive their provider at construction time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// A chat-completion backend that turns an ordered message list into text.
///
/// Failures surface as [`RagError::LlmError`](crate::RagError::LlmError) and
/// are never retried by this crate.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the given messages.
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}
