//! File-based conversation store for persistent storage
//!
//! Stores every conversation in a JSON file that persists across restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatflow_core::{
    latest_active, ChatflowError, ChatflowResult, Conversation, ConversationContext,
    ConversationRepository, ConversationStatus,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{idle_ids, new_conversation_id};

/// File-based conversation store
///
/// Keeps an in-memory cache and rewrites the JSON file after every
/// mutation, so a restarted process resumes conversations mid-flow.
///
/// ## Example
///
/// ```rust,no_run
/// use chatflow_memory::FileConversationStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileConversationStore::open("./data/conversations.json").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FileConversationStore {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory cache of conversations by id
    cache: Arc<RwLock<HashMap<String, Conversation>>>,
}

impl FileConversationStore {
    /// Open (or create) a store at the given path
    ///
    /// If the file exists, loads existing conversations. Otherwise starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> ChatflowResult<Self> {
        let path = path.into();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ChatflowError::storage(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let cache: HashMap<String, Conversation> = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                ChatflowError::storage(format!(
                    "Failed to read conversation file {}: {}",
                    path.display(),
                    e
                ))
            })?;

            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    ChatflowError::storage(format!(
                        "Failed to parse conversation file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
        } else {
            HashMap::new()
        };

        debug!("Opened conversation store {} ({} rows)", path.display(), cache.len());

        Ok(Self {
            path,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    /// Persist current cache to file
    async fn persist(&self) -> ChatflowResult<()> {
        let cache = self.cache.read().await;
        let content = serde_json::to_string_pretty(&*cache).map_err(|e| {
            ChatflowError::storage(format!("Failed to serialize conversations: {}", e))
        })?;
        drop(cache);

        tokio::fs::write(&self.path, content).await.map_err(|e| {
            ChatflowError::storage(format!(
                "Failed to write conversation file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Apply a change to one conversation and persist
    async fn modify<F>(&self, id: &str, change: F) -> ChatflowResult<()>
    where
        F: FnOnce(&mut Conversation),
    {
        {
            let mut cache = self.cache.write().await;
            let conversation = cache
                .get_mut(id)
                .ok_or_else(|| ChatflowError::ConversationNotFound(id.to_string()))?;
            change(conversation);
            conversation.touch();
        }
        self.persist().await
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Copy of every stored conversation
    pub async fn snapshot(&self) -> Vec<Conversation> {
        self.cache.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Mark active conversations idle for longer than `max_idle` as abandoned
    pub async fn abandon_idle(&self, max_idle: Duration) -> ChatflowResult<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::zero());
        let count = {
            let mut cache = self.cache.write().await;
            let ids = idle_ids(cache.values(), cutoff);
            for id in &ids {
                if let Some(conversation) = cache.get_mut(id) {
                    conversation.status = ConversationStatus::Abandoned;
                    conversation.touch();
                }
            }
            ids.len()
        };
        if count > 0 {
            self.persist().await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl ConversationRepository for FileConversationStore {
    async fn get_active_conversation(
        &self,
        user_id: &str,
        platform: &str,
    ) -> ChatflowResult<Option<Conversation>> {
        let cache = self.cache.read().await;
        Ok(latest_active(cache.values(), user_id, platform).cloned())
    }

    async fn create(&self, user_id: &str, platform: &str, flow_name: &str) -> ChatflowResult<String> {
        let id = new_conversation_id();
        {
            let mut cache = self.cache.write().await;
            cache.insert(
                id.clone(),
                Conversation::new(id.clone(), user_id, platform, flow_name),
            );
        }
        self.persist().await?;
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> ChatflowResult<Option<Conversation>> {
        Ok(self.cache.read().await.get(id).cloned())
    }

    async fn update_context(&self, id: &str, context: &ConversationContext) -> ChatflowResult<()> {
        let context = context.clone();
        self.modify(id, move |c| c.context = context).await
    }

    async fn mark_completed(&self, id: &str) -> ChatflowResult<()> {
        self.modify(id, |c| c.status = ConversationStatus::Completed).await
    }

    async fn mark_abandoned(&self, id: &str) -> ChatflowResult<()> {
        self.modify(id, |c| c.status = ConversationStatus::Abandoned).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_create_and_get() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversations.json");

        let store = FileConversationStore::open(&path).await.unwrap();
        let id = store.create("u1", "telegram", "sales").await.unwrap();

        let conversation = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(conversation.platform, "telegram");

        // Verify file was created
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_store_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversations.json");

        let mut ctx = ConversationContext::new();
        ctx.current_step_id = Some("ask_company_size".into());
        ctx.set("name", json!("Ada"));
        ctx.set("company_size", json!("1-10"));

        let id = {
            let store = FileConversationStore::open(&path).await.unwrap();
            let id = store.create("u1", "whatsapp", "pricing").await.unwrap();
            store.update_context(&id, &ctx).await.unwrap();
            id
        };

        // Reopen and verify the context survived byte for byte
        let store = FileConversationStore::open(&path).await.unwrap();
        let conversation = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(conversation.context, ctx);
        assert_eq!(
            store.get_active_conversation("u1", "whatsapp").await.unwrap().unwrap().id,
            id
        );
    }

    #[tokio::test]
    async fn test_file_store_status_changes() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::open(dir.path().join("c.json")).await.unwrap();

        let first = store.create("u1", "telegram", "sales").await.unwrap();
        let second = store.create("u2", "telegram", "sales").await.unwrap();
        store.mark_completed(&first).await.unwrap();
        store.mark_abandoned(&second).await.unwrap();

        let reopened = FileConversationStore::open(store.path().clone()).await.unwrap();
        assert_eq!(
            reopened.get_by_id(&first).await.unwrap().unwrap().status,
            ConversationStatus::Completed
        );
        assert_eq!(
            reopened.get_by_id(&second).await.unwrap().unwrap().status,
            ConversationStatus::Abandoned
        );
    }

    #[tokio::test]
    async fn test_file_store_creates_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/conversations.json");

        let store = FileConversationStore::open(&path).await.unwrap();
        store.create("u1", "telegram", "sales").await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_store_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversations.json");
        std::fs::write(&path, "  \n").unwrap();

        let store = FileConversationStore::open(&path).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conversations.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(FileConversationStore::open(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_missing_conversation() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::open(dir.path().join("c.json")).await.unwrap();
        let err = store.mark_completed("missing").await.unwrap_err();
        assert!(matches!(err, ChatflowError::ConversationNotFound(_)));
    }
}
