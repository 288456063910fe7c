//! Embedding provider trait and factory.

use crate::types::KnowledgeBaseConfig;
use askbot_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider for a knowledge base.
pub fn create_provider(config: &KnowledgeBaseConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let dimensions = config.embedding_dim as usize;
    if dimensions == 0 {
        return Err(AppError::Knowledge(
            "Embedding dimension must be greater than zero".to_string(),
        ));
    }

    match config.provider.as_str() {
        "trigram" => Ok(Arc::new(super::providers::TrigramProvider::new(dimensions))),

        "ollama" => {
            let endpoint = config
                .endpoint
                .as_deref()
                .unwrap_or(super::providers::ollama::DEFAULT_OLLAMA_URL);
            let provider =
                super::providers::OllamaProvider::new(endpoint, &config.model, dimensions)?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Knowledge(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}
