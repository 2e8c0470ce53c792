//! Deterministic stub providers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use ragdex::{Chunk, EmbeddingProvider, LlmProvider, Message, RagError, Result};

/// Embeds text as a one-hot vector on its first word's position in `vocab`.
///
/// Unknown first words map to a uniform vector; texts listed in `zero` map to
/// the zero vector. Calls and batch sizes are recorded.
pub struct StubEmbedder {
    vocab: Vec<String>,
    dims: usize,
    zero: HashSet<String>,
    fail: AtomicBool,
    pub batch_calls: AtomicUsize,
    pub embedded_texts: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(vocab: &[&str]) -> Self {
        Self {
            vocab: vocab.iter().map(|w| w.to_lowercase()).collect(),
            dims: vocab.len() + 1,
            zero: HashSet::new(),
            fail: AtomicBool::new(false),
            batch_calls: AtomicUsize::new(0),
            embedded_texts: AtomicUsize::new(0),
        }
    }

    pub fn with_zero_vector_for(mut self, text: &str) -> Self {
        self.zero.insert(text.to_string());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dims];
        if self.zero.contains(text) {
            return v;
        }
        let first = first_word(text);
        match self.vocab.iter().position(|w| *w == first) {
            Some(i) => v[i] = 1.0,
            None => {
                let value = 1.0 / (self.dims as f32).sqrt();
                v.iter_mut().for_each(|x| *x = value);
            }
        }
        v
    }
}

pub fn first_word(text: &str) -> String {
    text.split_whitespace()
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingError {
                provider: "stub".into(),
                message: "simulated outage".into(),
            });
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingError {
                provider: "stub".into(),
                message: "simulated outage".into(),
            });
        }
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Hash-based embedder for arbitrary text, normalised to unit length.
pub struct HashEmbedder {
    pub dims: usize,
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dims];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Returns a fixed reply, or fails for prompts containing a marker.
pub struct ScriptedLlm {
    reply: String,
    fail_marker: Option<String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail_marker: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt: String = messages.iter().map(|m| m.content.as_str()).collect();
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(RagError::LlmError {
                    provider: "scripted".into(),
                    message: "simulated failure".into(),
                });
            }
        }
        Ok(self.reply.clone())
    }
}

pub fn chunk(id: &str, text: &str) -> Chunk {
    Chunk::new(id, text, format!("doc_{id}"))
}
