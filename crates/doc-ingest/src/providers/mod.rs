//! Provider abstractions for LLM vendors, chunk embedding and chunk indexing
//!
//! Vendors sit behind the [`LlmProvider`] trait and are chosen from
//! configuration by [`build_provider`].

pub mod anthropic;
pub mod embedder;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod placeholder;

use std::sync::Arc;

use crate::config::{LlmConfig, LlmProviderKind};
use crate::error::Result;

pub use anthropic::AnthropicProvider;
pub use embedder::ChunkEmbedder;
pub use index::{ChunkIndex, InMemoryChunkIndex};
pub use llm::{ChatMessage, LlmProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use placeholder::PlaceholderProvider;

/// Build the provider selected by the configuration
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        LlmProviderKind::Placeholder => {
            Arc::new(PlaceholderProvider::new(config.embedding_dimensions))
        }
        LlmProviderKind::OpenAi | LlmProviderKind::SiliconFlow | LlmProviderKind::Qwen => {
            Arc::new(OpenAiCompatibleProvider::new(config)?)
        }
        LlmProviderKind::Ollama => Arc::new(OllamaProvider::new(config)?),
        LlmProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
    };

    tracing::info!(
        "LLM provider: {} (model: {}, embedding dimensions: {})",
        provider.name(),
        provider.model(),
        provider.dimensions()
    );

    Ok(provider)
}
