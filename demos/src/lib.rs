//! Shared helpers for the ragdex demos.

use ragdex::{EmbeddingProvider, Result};

/// Deterministic keyword embeddings so the demos run without API keys.
///
/// Each dimension counts occurrences of one keyword; texts that share
/// keywords point in similar directions.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self { keywords: keywords.to_vec() }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(self.keywords.iter().map(|k| text.matches(k).count() as f32).collect())
    }

    fn dimensions(&self) -> usize {
        self.keywords.len()
    }
}

/// First `max` characters of `text`, for printing.
pub fn preview(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out.replace('\n', " ")
}
