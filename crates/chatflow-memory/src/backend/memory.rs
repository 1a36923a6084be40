//! In-memory conversation store, cleared on restart

use std::time::Duration;

use async_trait::async_trait;
use chatflow_core::{
    latest_active, ChatflowError, ChatflowResult, Conversation, ConversationContext,
    ConversationRepository, ConversationStatus,
};
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use super::{idle_ids, new_conversation_id};

/// Lock-free conversation store keyed by conversation id
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: DashMap<String, Conversation>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored conversation
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Mark active conversations idle for longer than `max_idle` as abandoned
    pub fn abandon_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::zero());
        let snapshot = self.snapshot();
        let ids = idle_ids(&snapshot, cutoff);
        for id in &ids {
            self.set_status(id, ConversationStatus::Abandoned).ok();
        }
        ids.len()
    }

    fn set_status(&self, id: &str, status: ConversationStatus) -> ChatflowResult<()> {
        let mut entry = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| ChatflowError::ConversationNotFound(id.to_string()))?;
        entry.status = status;
        entry.touch();
        debug!(conversation_id = id, %status, "Conversation status changed");
        Ok(())
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationStore {
    async fn get_active_conversation(
        &self,
        user_id: &str,
        platform: &str,
    ) -> ChatflowResult<Option<Conversation>> {
        let snapshot = self.snapshot();
        Ok(latest_active(&snapshot, user_id, platform).cloned())
    }

    async fn create(&self, user_id: &str, platform: &str, flow_name: &str) -> ChatflowResult<String> {
        let id = new_conversation_id();
        let conversation = Conversation::new(id.clone(), user_id, platform, flow_name);
        self.conversations.insert(id.clone(), conversation);
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> ChatflowResult<Option<Conversation>> {
        Ok(self.conversations.get(id).map(|r| r.value().clone()))
    }

    async fn update_context(&self, id: &str, context: &ConversationContext) -> ChatflowResult<()> {
        let mut entry = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| ChatflowError::ConversationNotFound(id.to_string()))?;
        entry.context = context.clone();
        entry.touch();
        Ok(())
    }

    async fn mark_completed(&self, id: &str) -> ChatflowResult<()> {
        self.set_status(id, ConversationStatus::Completed)
    }

    async fn mark_abandoned(&self, id: &str) -> ChatflowResult<()> {
        self.set_status(id, ConversationStatus::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryConversationStore::new();
        let id = store.create("u1", "telegram", "sales").await.unwrap();

        let conversation = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(conversation.user_id, "u1");
        assert_eq!(conversation.current_flow.as_deref(), Some("sales"));
        assert!(conversation.is_active());
        assert!(conversation.context.current_step_id.is_none());
    }

    #[tokio::test]
    async fn test_update_context_round_trip() {
        let store = InMemoryConversationStore::new();
        let id = store.create("u1", "telegram", "sales").await.unwrap();
        let before = store.get_by_id(&id).await.unwrap().unwrap().last_activity;

        let mut ctx = ConversationContext::new();
        ctx.current_step_id = Some("ask_email".into());
        ctx.set("name", json!("Ada"));
        store.update_context(&id, &ctx).await.unwrap();

        let stored = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.context, ctx);
        assert!(stored.last_activity >= before);
    }

    #[tokio::test]
    async fn test_active_lookup_ignores_completed() {
        let store = InMemoryConversationStore::new();
        let id = store.create("u1", "whatsapp", "sales").await.unwrap();
        assert_eq!(
            store.get_active_conversation("u1", "whatsapp").await.unwrap().unwrap().id,
            id
        );

        store.mark_completed(&id).await.unwrap();
        assert!(store.get_active_conversation("u1", "whatsapp").await.unwrap().is_none());
        assert_eq!(
            store.get_by_id(&id).await.unwrap().unwrap().status,
            ConversationStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_update_missing_conversation() {
        let store = InMemoryConversationStore::new();
        let err = store
            .update_context("nope", &ConversationContext::new())
            .await
            .unwrap_err();
        assert!(err.is_state());
    }

    #[tokio::test]
    async fn test_abandon_idle() {
        let store = InMemoryConversationStore::new();
        let id = store.create("u1", "telegram", "sales").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.abandon_idle(Duration::from_secs(3600)), 0);
        assert_eq!(store.abandon_idle(Duration::from_millis(5)), 1);
        assert_eq!(
            store.get_by_id(&id).await.unwrap().unwrap().status,
            ConversationStatus::Abandoned
        );
    }
}
