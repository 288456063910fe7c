//! Per-conversation history persistence and turn serialization.
//!
//! Turns of the same conversation run one at a time; distinct
//! conversations proceed concurrently.

use crate::history::ConversationHistory;
use crate::pipeline::{AnswerOutcome, AnswerPipeline};
use askbot_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Storage for conversation histories keyed by conversation id.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load a history; unknown ids yield an empty history.
    async fn load(&self, conversation_id: &str) -> AppResult<ConversationHistory>;

    async fn save(&self, conversation_id: &str, history: &ConversationHistory) -> AppResult<()>;

    /// Remove a history. Returns whether anything was removed.
    async fn clear(&self, conversation_id: &str) -> AppResult<bool>;

    /// Known conversation ids, sorted.
    async fn list(&self) -> AppResult<Vec<String>>;
}

/// In-process store, lost on exit.
#[derive(Default)]
pub struct MemoryConversationStore {
    histories: RwLock<HashMap<String, ConversationHistory>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, conversation_id: &str) -> AppResult<ConversationHistory> {
        Ok(self
            .histories
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, conversation_id: &str, history: &ConversationHistory) -> AppResult<()> {
        self.histories
            .write()
            .await
            .insert(conversation_id.to_string(), history.clone());
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> AppResult<bool> {
        Ok(self
            .histories
            .write()
            .await
            .remove(conversation_id)
            .is_some())
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        let mut ids: Vec<String> = self.histories.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// JSON files under a directory, one per conversation.
pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, conversation_id: &str) -> AppResult<PathBuf> {
        let valid = !conversation_id.is_empty()
            && conversation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::History(format!(
                "Invalid conversation id '{}': use letters, digits, '-' or '_'",
                conversation_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", conversation_id)))
    }
}

#[async_trait::async_trait]
impl ConversationStore for FileConversationStore {
    async fn load(&self, conversation_id: &str) -> AppResult<ConversationHistory> {
        let path = self.path_for(conversation_id)?;
        if !path.exists() {
            return Ok(ConversationHistory::new());
        }

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::History(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AppError::History(format!("Corrupt history file {}: {}", path.display(), e))
        })
    }

    async fn save(&self, conversation_id: &str, history: &ConversationHistory) -> AppResult<()> {
        let path = self.path_for(conversation_id)?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            AppError::History(format!(
                "Failed to create {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let content = serde_json::to_string_pretty(history)?;
        // Replace atomically via a sibling temp file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(|e| {
            AppError::History(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            AppError::History(format!("Failed to replace {}: {}", path.display(), e))
        })
    }

    async fn clear(&self, conversation_id: &str) -> AppResult<bool> {
        let path = self.path_for(conversation_id)?;
        if !path.exists() {
            return Ok(false);
        }
        tokio::fs::remove_file(&path).await.map_err(|e| {
            AppError::History(format!("Failed to remove {}: {}", path.display(), e))
        })?;
        Ok(true)
    }

    async fn list(&self) -> AppResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Runs turns against stored conversations.
pub struct ConversationManager {
    pipeline: AnswerPipeline,
    store: Arc<dyn ConversationStore>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationManager {
    pub fn new(pipeline: AnswerPipeline, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            pipeline,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    fn lock_for(&self, conversation_id: &str) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::Other("conversation lock table poisoned".to_string()))?;
        Ok(locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Answer one question in a conversation and persist the updated history.
    ///
    /// The history is saved only when the turn succeeded and changed it.
    #[tracing::instrument(skip(self, question, cancel))]
    pub async fn handle_turn(
        &self,
        conversation_id: &str,
        question: &str,
        cancel: &CancellationToken,
    ) -> AppResult<AnswerOutcome> {
        let lock = self.lock_for(conversation_id)?;
        let _guard = lock.lock().await;

        let mut history = self.store.load(conversation_id).await?;
        let before = history.clone();

        let outcome = self.pipeline.answer(question, &mut history, cancel).await?;

        if history != before {
            self.store.save(conversation_id, &history).await?;
        }

        Ok(outcome)
    }

    /// Forget a conversation's history.
    pub async fn reset(&self, conversation_id: &str) -> AppResult<bool> {
        let lock = self.lock_for(conversation_id)?;
        let _guard = lock.lock().await;
        self.store.clear(conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ChatTurn;
    use tempfile::TempDir;

    fn sample_history() -> ConversationHistory {
        [ChatTurn::new("hi", "hello"), ChatTurn::new("bye", "see you")]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryConversationStore::new();
        assert!(store.load("a").await.unwrap().is_empty());

        store.save("a", &sample_history()).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), sample_history());
        assert_eq!(store.list().await.unwrap(), vec!["a".to_string()]);

        assert!(store.clear("a").await.unwrap());
        assert!(!store.clear("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_persists_json() {
        let dir = TempDir::new().unwrap();
        let store = FileConversationStore::new(dir.path().join("conversations"));

        store.save("user-1", &sample_history()).await.unwrap();
        let raw = std::fs::read_to_string(dir.path().join("conversations/user-1.json")).unwrap();
        assert!(raw.contains("see you"));

        let reopened = FileConversationStore::new(dir.path().join("conversations"));
        assert_eq!(reopened.load("user-1").await.unwrap(), sample_history());
        assert_eq!(reopened.list().await.unwrap(), vec!["user-1".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileConversationStore::new(dir.path());

        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.save("", &ConversationHistory::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileConversationStore::new(dir.path().join("nothing-here"));

        assert!(store.list().await.unwrap().is_empty());
        assert!(store.load("x").await.unwrap().is_empty());
        assert!(!store.clear("x").await.unwrap());
    }
}
