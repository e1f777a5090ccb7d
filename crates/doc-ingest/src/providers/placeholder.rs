//! Offline provider returning zero vectors

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::llm::{ChatMessage, LlmProvider};

/// Provider used when no vendor is configured
///
/// Embeddings are zero vectors of the configured dimension so the pipeline
/// runs end to end without network access. Text generation is unavailable.
pub struct PlaceholderProvider {
    dimensions: usize,
}

impl PlaceholderProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for PlaceholderProvider {
    fn default() -> Self {
        Self::new(1536)
    }
}

#[async_trait]
impl LlmProvider for PlaceholderProvider {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(Error::llm(
            "Text generation is unavailable with the placeholder provider",
        ))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tracing::debug!("Generating {} placeholder vectors", texts.len());
        Ok(texts.iter().map(|_| vec![0.0; self.dimensions]).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "placeholder"
    }

    fn model(&self) -> &str {
        "none"
    }
}
