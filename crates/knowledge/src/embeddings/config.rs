//! Embedding settings a knowledge base is indexed with.

use crate::types::KnowledgeBaseConfig;
use askbot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_base(&KnowledgeBaseConfig::default())
    }
}

impl EmbeddingConfig {
    /// Extract the embedding settings from a base config.
    pub fn from_base(config: &KnowledgeBaseConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            dimensions: config.embedding_dim as usize,
        }
    }

    /// Validate that another config is consistent with this one.
    ///
    /// Vectors from different providers, models or sizes are not comparable,
    /// so an index must be queried with the settings it was built with.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Knowledge(format!(
                "Provider mismatch: index built with '{}', config uses '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Knowledge(format!(
                "Model mismatch: index built with '{}', config uses '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Knowledge(format!(
                "Dimension mismatch: index built with {}, config uses {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}
