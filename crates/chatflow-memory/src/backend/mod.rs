//! Conversation store backends

pub mod file;
pub mod memory;

use chrono::{DateTime, Utc};
use chatflow_core::{Conversation, ConversationStatus};

/// Fresh conversation id
pub(crate) fn new_conversation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Ids of active conversations idle since before `cutoff`
pub(crate) fn idle_ids<'a, I>(conversations: I, cutoff: DateTime<Utc>) -> Vec<String>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    conversations
        .into_iter()
        .filter(|c| c.status == ConversationStatus::Active && c.last_activity < cutoff)
        .map(|c| c.id.clone())
        .collect()
}
