//! Knowledge base management and retrieval.
//!
//! Documents are parsed, chunked, embedded and stored in a per-base SQLite
//! index under `.askbot/knowledge/<base>/`. The [`Retriever`] trait is the
//! search surface the answer pipeline consumes; [`IndexRetriever`] is its
//! index-backed implementation.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod index;
pub mod parser;
pub mod retriever;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use context::build_reference_context;
pub use retriever::{IndexRetriever, QueryLanguage, RetrievedPassage, Retriever};
pub use types::{
    BaseStats, KnowledgeBaseConfig, KnowledgeChunk, KnowledgeSource, LearnOptions, LearnStats,
};

use askbot_core::{AppError, AppResult};
use chrono::Utc;
use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use parser::ContentType;
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

/// Learn from sources and populate the knowledge base.
///
/// Unsupported or unreadable files are skipped and counted; embedding or
/// index failures abort the run.
pub async fn learn(workspace: &Path, options: LearnOptions) -> AppResult<LearnStats> {
    let start = Instant::now();

    tracing::info!("Starting learn operation for base '{}'", options.base_name);

    let config = config::load_config(workspace, &options.base_name)?;
    let embedding_config = EmbeddingConfig::from_base(&config);

    let index_path = config::get_index_path(workspace, &options.base_name);
    let conn = index::init_index(&index_path)?;

    if options.reset {
        tracing::info!("Resetting knowledge base");
        index::reset_index(&conn)?;
    } else if let Some(built_with) = index::read_embedding_meta(&conn)? {
        built_with.validate_consistency(&embedding_config)?;
    }

    let embedder = create_provider(&config)?;

    let mut files = Vec::new();
    for path in &options.paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && should_include(entry_path, &options) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            tracing::warn!("Path does not exist: {:?}", path);
        }
    }

    let mut stats = LearnStats {
        sources_count: 0,
        skipped_count: 0,
        chunks_count: 0,
        bytes_processed: 0,
        duration_secs: 0.0,
    };

    for file in &files {
        if !ContentType::from_path(file).is_supported() {
            tracing::debug!("Skipping unsupported file: {:?}", file);
            stats.skipped_count += 1;
            continue;
        }

        let text = match parser::parse_file(file) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file, e);
                stats.skipped_count += 1;
                continue;
            }
        };

        let (chunks, bytes) = process_file(&conn, embedder.as_ref(), &config, file, &text).await?;
        stats.sources_count += 1;
        stats.chunks_count += chunks;
        stats.bytes_processed += bytes;
    }

    if stats.chunks_count > 0 {
        index::write_embedding_meta(&conn, &embedding_config)?;
    }
    config::save_config(workspace, &config)?;

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Learn operation completed: {} sources, {} chunks, {} bytes in {:.2}s ({} skipped)",
        stats.sources_count,
        stats.chunks_count,
        stats.bytes_processed,
        stats.duration_secs,
        stats.skipped_count
    );

    Ok(stats)
}

/// Chunk, embed and store the text of a single file. Returns (chunks, bytes).
async fn process_file(
    conn: &Connection,
    embedder: &dyn EmbeddingProvider,
    config: &KnowledgeBaseConfig,
    path: &Path,
    text: &str,
) -> AppResult<(u32, u64)> {
    tracing::debug!("Processing file: {:?}", path);

    let size_bytes = text.len() as u64;

    let source_id = uuid::Uuid::new_v4().to_string();
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| source_id.clone());

    let candidates = chunker::chunk_text(
        &source_id,
        text,
        config.chunk_size as usize,
        config.chunk_overlap as usize,
    );

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;
    if embeddings.len() != candidates.len() {
        return Err(AppError::Knowledge(format!(
            "Embedding provider returned {} vectors for {} chunks",
            embeddings.len(),
            candidates.len()
        )));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| AppError::Knowledge(format!("Failed to start transaction: {}", e)))?;

    let replaced = index::remove_source_by_path(&tx, path)?;
    if replaced > 0 {
        tracing::debug!("Replacing {} existing chunks for {:?}", replaced, path);
    }

    index::insert_source(
        &tx,
        &KnowledgeSource {
            id: source_id.clone(),
            path: path.to_path_buf(),
            content_type: ContentType::from_path(path).as_str().to_string(),
            learned_at: Utc::now(),
            size_bytes,
        },
    )?;

    let mut chunks_count = 0u32;
    for (candidate, embedding) in candidates.into_iter().zip(embeddings) {
        let mut metadata = candidate.metadata;
        if let Some(map) = metadata.as_object_mut() {
            map.insert("source".to_string(), serde_json::Value::String(label.clone()));
        }

        index::insert_chunk(
            &tx,
            &KnowledgeChunk {
                id: uuid::Uuid::new_v4().to_string(),
                source_id: candidate.source_id,
                position: candidate.position,
                text: candidate.text,
                embedding: Some(embedding),
                metadata,
            },
        )?;
        chunks_count += 1;
    }

    tx.commit()
        .map_err(|e| AppError::Knowledge(format!("Failed to commit {:?}: {}", path, e)))?;

    tracing::debug!(
        "Processed {:?}: {} chunks, {} bytes",
        path,
        chunks_count,
        size_bytes
    );

    Ok((chunks_count, size_bytes))
}

/// Check if a file should be included based on patterns.
fn should_include(path: &Path, options: &LearnOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options.exclude.iter().any(|p| path_str.contains(p.as_str())) {
        return false;
    }

    options.include.is_empty() || options.include.iter().any(|p| path_str.contains(p.as_str()))
}

/// Search a knowledge base directly, bypassing the answer pipeline.
pub async fn search(
    workspace: &Path,
    base_name: &str,
    query: &str,
    language: QueryLanguage,
    top_k: usize,
) -> AppResult<Vec<RetrievedPassage>> {
    let retriever = IndexRetriever::open(workspace, base_name, top_k)?;
    retriever.search(query, language).await
}

/// Clean (reset) a knowledge base.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let conn = index::init_index(&index_path)?;
    index::reset_index(&conn)?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}

/// Get statistics for a knowledge base.
pub fn stats(workspace: &Path, base_name: &str) -> AppResult<BaseStats> {
    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    let conn = index::init_index(&index_path)?;
    let (sources_count, chunks_count, last_learn_at) = index::get_stats(&conn)?;

    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(BaseStats {
        base_name: base_name.to_string(),
        sources_count,
        chunks_count,
        db_size_bytes,
        last_learn_at,
    })
}
