//! Chunk embedding through an LLM provider

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Chunk, EmbeddedChunk};

use super::llm::LlmProvider;

/// Batches sent to the provider at the same time
const DEFAULT_CONCURRENCY: usize = 4;

/// Embeds chunk texts in batches and attaches the vectors
pub struct ChunkEmbedder {
    provider: Arc<dyn LlmProvider>,
    batch_size: usize,
    concurrency: usize,
}

impl ChunkEmbedder {
    pub fn new(provider: Arc<dyn LlmProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed raw texts, preserving order
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let requests: Vec<_> = texts
            .chunks(self.batch_size)
            .map(|batch| async move {
                let vectors = self.provider.embed(batch).await?;
                if vectors.len() != batch.len() {
                    return Err(Error::embedding(format!(
                        "{} returned {} vectors for {} texts",
                        self.provider.name(),
                        vectors.len(),
                        batch.len()
                    )));
                }
                Ok::<_, Error>(vectors)
            })
            .collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(requests)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Embed chunks, attaching `embedding` and `embedding_dim` to each
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<EmbeddedChunk>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_texts(&texts).await?;

        tracing::debug!(
            "Embedded {} chunks with {}",
            chunks.len(),
            self.provider.name()
        );

        Ok(chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
            .collect())
    }
}
