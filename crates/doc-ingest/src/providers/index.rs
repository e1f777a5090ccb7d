//! Chunk index for embedded chunks

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Chunk, EmbeddedChunk};

/// Storage for embedded chunks, keyed by source document
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Store the chunks of a document, replacing any previous version
    async fn index(&self, filename: &str, chunks: &[EmbeddedChunk]) -> Result<usize>;

    /// One stored chunk of a document
    async fn chunk(&self, filename: &str, chunk_id: &str) -> Result<Option<Chunk>>;

    /// Get total number of chunks stored
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get index name for logging
    fn name(&self) -> &str;
}

/// Brute-force in-memory index
#[derive(Default)]
pub struct InMemoryChunkIndex {
    documents: RwLock<HashMap<String, Vec<EmbeddedChunk>>>,
}

impl InMemoryChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks stored for a document
    pub fn document(&self, filename: &str) -> Option<Vec<EmbeddedChunk>> {
        self.documents.read().get(filename).cloned()
    }
}

#[async_trait]
impl ChunkIndex for InMemoryChunkIndex {
    async fn index(&self, filename: &str, chunks: &[EmbeddedChunk]) -> Result<usize> {
        if let Some(first) = chunks.first() {
            let dim = first.embedding_dim;
            if chunks.iter().any(|c| c.embedding_dim != dim) {
                return Err(Error::Index(format!(
                    "Mixed embedding dimensions in {}",
                    filename
                )));
            }
        }

        let previous = self
            .documents
            .write()
            .insert(filename.to_string(), chunks.to_vec());
        if let Some(previous) = previous {
            tracing::debug!("Replaced {} chunks of {}", previous.len(), filename);
        }

        Ok(chunks.len())
    }

    async fn chunk(&self, filename: &str, chunk_id: &str) -> Result<Option<Chunk>> {
        Ok(self.documents.read().get(filename).and_then(|chunks| {
            chunks
                .iter()
                .find(|c| c.chunk.chunk_id == chunk_id)
                .map(|c| c.chunk.clone())
        }))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.documents.read().values().map(Vec::len).sum())
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlockType;

    fn embedded(i: usize, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk::new(i, format!("第{}块", i), vec![1], vec![BlockType::Paragraph]),
            vector,
        )
    }

    #[tokio::test]
    async fn test_index_replaces_document() {
        let index = InMemoryChunkIndex::new();
        index
            .index("a.pdf", &[embedded(0, vec![1.0, 0.0]), embedded(1, vec![0.0, 1.0])])
            .await
            .unwrap();
        index.index("b.pdf", &[embedded(0, vec![1.0, 1.0])]).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 3);

        index.index("a.pdf", &[embedded(0, vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 2);
        assert_eq!(index.document("a.pdf").unwrap().len(), 1);
        assert!(index.chunk("a.pdf", "chunk_0001").await.unwrap().is_none());
        assert!(!index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_chunk_lookup() {
        let index = InMemoryChunkIndex::new();
        index
            .index("a.pdf", &[embedded(0, vec![1.0, 0.0]), embedded(1, vec![0.0, 1.0])])
            .await
            .unwrap();

        let chunk = index.chunk("a.pdf", "chunk_0001").await.unwrap().unwrap();
        assert_eq!(chunk.text, "第1块");
        assert!(index.chunk("a.pdf", "chunk_0009").await.unwrap().is_none());
        assert!(index.chunk("b.pdf", "chunk_0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mixed_dimensions_rejected() {
        let index = InMemoryChunkIndex::new();
        let err = index
            .index("a.pdf", &[embedded(0, vec![1.0]), embedded(1, vec![1.0, 2.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Index(_)));
        assert!(index.is_empty().await.unwrap());
    }
}
