//! SQLite-backed vector index for knowledge chunks.

use crate::embeddings::EmbeddingConfig;
use crate::types::{KnowledgeChunk, KnowledgeSource};
use askbot_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Initialize the SQLite index database.
pub fn init_index(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            content_type TEXT NOT NULL,
            learned_at TEXT NOT NULL,
            size_bytes INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT,
            FOREIGN KEY (source_id) REFERENCES sources(id)
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id);

        CREATE TABLE IF NOT EXISTS embedding_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            dimensions INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

    tracing::debug!("Initialized SQLite index at {:?}", db_path);
    Ok(conn)
}

/// Insert a source into the index.
pub fn insert_source(conn: &Connection, source: &KnowledgeSource) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sources (id, path, content_type, learned_at, size_bytes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            source.id,
            source.path.to_string_lossy().to_string(),
            source.content_type,
            source.learned_at.to_rfc3339(),
            source.size_bytes as i64,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert source: {}", e)))?;

    Ok(())
}

/// Remove a source and its chunks, returning the number of chunks removed.
///
/// Re-learning a file replaces its earlier chunks instead of duplicating them.
pub fn remove_source_by_path(conn: &Connection, path: &Path) -> AppResult<usize> {
    let path = path.to_string_lossy().to_string();

    let removed = conn
        .execute(
            "DELETE FROM chunks WHERE source_id IN (SELECT id FROM sources WHERE path = ?1)",
            params![path],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))?;

    conn.execute("DELETE FROM sources WHERE path = ?1", params![path])
        .map_err(|e| AppError::Knowledge(format!("Failed to delete source: {}", e)))?;

    Ok(removed)
}

/// Insert a chunk with embedding into the index.
pub fn insert_chunk(conn: &Connection, chunk: &KnowledgeChunk) -> AppResult<()> {
    let embedding_bytes = embedding_to_bytes(
        chunk
            .embedding
            .as_ref()
            .ok_or_else(|| AppError::Knowledge("Chunk missing embedding".to_string()))?,
    );

    let metadata_json = serde_json::to_string(&chunk.metadata)
        .map_err(|e| AppError::Knowledge(format!("Failed to serialize metadata: {}", e)))?;

    conn.execute(
        "INSERT OR REPLACE INTO chunks (id, source_id, position, text, embedding, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chunk.id,
            chunk.source_id,
            chunk.position as i64,
            chunk.text,
            embedding_bytes,
            metadata_json,
        ],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

    Ok(())
}

/// Query the index for the top-k most similar chunks, best first.
pub fn query_chunks(
    conn: &Connection,
    query_embedding: &[f32],
    top_k: usize,
) -> AppResult<Vec<(KnowledgeChunk, f32)>> {
    let mut stmt = conn
        .prepare("SELECT id, source_id, position, text, embedding, metadata FROM chunks")
        .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map([], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            let metadata_json: Option<String> = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                embedding_bytes,
                metadata_json,
            ))
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        let (id, source_id, position, text, embedding_bytes, metadata_json) =
            row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk row: {}", e)))?;

        let embedding = match bytes_to_embedding(&embedding_bytes) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Skipping chunk {} with corrupt embedding: {}", id, e);
                continue;
            }
        };

        let metadata = metadata_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or(serde_json::Value::Null);

        let score = cosine_similarity(query_embedding, &embedding);
        results.push((
            KnowledgeChunk {
                id,
                source_id,
                position: position as u32,
                text,
                embedding: Some(embedding),
                metadata,
            },
            score,
        ));
    }

    // Sort by score descending
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);

    tracing::debug!(
        "Retrieved {} chunks (requested top-{})",
        results.len(),
        top_k
    );

    Ok(results)
}

/// Counts and last learn time for the index.
pub fn get_stats(conn: &Connection) -> AppResult<(u32, u32, Option<DateTime<Utc>>)> {
    let sources_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM sources", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count sources: {}", e)))?;

    let chunks_count: u32 = conn
        .query_row("SELECT COUNT(*) FROM chunks", [], |row| {
            row.get::<_, i64>(0).map(|v| v as u32)
        })
        .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))?;

    let last_learned: Option<String> = conn
        .query_row("SELECT MAX(learned_at) FROM sources", [], |row| row.get(0))
        .map_err(|e| AppError::Knowledge(format!("Failed to read learn time: {}", e)))?;

    let last_learn_at = last_learned
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok((sources_count, chunks_count, last_learn_at))
}

/// Embedding settings the index was built with, if any chunks were learned.
pub fn read_embedding_meta(conn: &Connection) -> AppResult<Option<EmbeddingConfig>> {
    conn.query_row(
        "SELECT provider, model, dimensions FROM embedding_meta WHERE id = 1",
        [],
        |row| {
            Ok(EmbeddingConfig {
                provider: row.get(0)?,
                model: row.get(1)?,
                dimensions: row.get::<_, i64>(2)? as usize,
            })
        },
    )
    .optional()
    .map_err(|e| AppError::Knowledge(format!("Failed to read embedding metadata: {}", e)))
}

/// Record the embedding settings used to build the index.
pub fn write_embedding_meta(conn: &Connection, config: &EmbeddingConfig) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO embedding_meta (id, provider, model, dimensions)
         VALUES (1, ?1, ?2, ?3)",
        params![config.provider, config.model, config.dimensions as i64],
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to write embedding metadata: {}", e)))?;

    Ok(())
}

/// Reset the index (delete all data).
pub fn reset_index(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "DELETE FROM chunks; DELETE FROM sources; DELETE FROM embedding_meta;",
    )
    .map_err(|e| AppError::Knowledge(format!("Failed to reset index: {}", e)))?;

    tracing::info!("Reset knowledge base index");
    Ok(())
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
