//! Similarity search over a knowledge base.

use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::{config, index};
use askbot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Language a query is phrased in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryLanguage {
    English,
    Chinese,
}

impl QueryLanguage {
    /// Locale code passed to search backends.
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en-us",
            Self::Chinese => "zh-cn",
        }
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A scored passage returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub source_id: String,
    pub content: String,
    /// Similarity in `[0, 1]`, higher is more relevant.
    pub score: f32,
}

/// Similarity search over a knowledge base.
///
/// Implementations return passages best first and an empty vector when
/// nothing matches; errors are reserved for backend failures.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        language: QueryLanguage,
    ) -> AppResult<Vec<RetrievedPassage>>;
}

/// Retriever backed by the SQLite vector index of one knowledge base.
pub struct IndexRetriever {
    base_name: String,
    index_path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl IndexRetriever {
    /// Open the named knowledge base in `workspace`.
    ///
    /// A base that was never learned is not an error; searches against it
    /// return no passages.
    pub fn open(workspace: &Path, base_name: &str, top_k: usize) -> AppResult<Self> {
        let base_config = config::load_config(workspace, base_name)?;
        let index_path = config::get_index_path(workspace, base_name);

        if index_path.exists() {
            let conn = index::init_index(&index_path)?;
            if let Some(built_with) = index::read_embedding_meta(&conn)? {
                built_with.validate_consistency(&EmbeddingConfig::from_base(&base_config))?;
            }
        } else {
            tracing::warn!(
                "Knowledge base '{}' has no index yet. Run 'askbot knowledge learn {} <paths>' first.",
                base_name,
                base_name
            );
        }

        let embedder = create_provider(&base_config)?;
        Ok(Self::with_embedder(base_name, index_path, embedder, top_k))
    }

    /// Build a retriever from explicit parts.
    pub fn with_embedder(
        base_name: &str,
        index_path: PathBuf,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            base_name: base_name.to_string(),
            index_path,
            embedder,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Retriever for IndexRetriever {
    async fn search(
        &self,
        query: &str,
        language: QueryLanguage,
    ) -> AppResult<Vec<RetrievedPassage>> {
        if query.trim().is_empty() || !self.index_path.exists() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            base = %self.base_name,
            language = %language,
            top_k = self.top_k,
            "Searching knowledge base"
        );

        let query_embedding = self.embedder.embed(query).await?;

        let index_path = self.index_path.clone();
        let top_k = self.top_k;
        let results = tokio::task::spawn_blocking(move || {
            let conn = index::init_index(&index_path)?;
            index::query_chunks(&conn, &query_embedding, top_k)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Index search task failed: {}", e)))??;

        let passages: Vec<RetrievedPassage> = results
            .into_iter()
            .map(|(chunk, score)| RetrievedPassage {
                source_id: chunk.citation(),
                content: chunk.text,
                score: score.clamp(0.0, 1.0),
            })
            .collect();

        tracing::debug!(
            language = %language,
            count = passages.len(),
            top_score = passages.first().map(|p| p.score).unwrap_or(0.0),
            "Search complete"
        );

        Ok(passages)
    }
}
