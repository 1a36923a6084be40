//! Conversation records and their per-turn context

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved context key holding the step pointer
pub const CURRENT_STEP_KEY: &str = "currentStepId";

/// Lifecycle of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
    /// Set by housekeeping or the router, never by the engine
    Abandoned,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Mutable key-value state of a conversation
///
/// Serializes as a flat JSON object: `currentStepId` next to every saved
/// answer, e.g. `{"currentStepId": "ask_email", "name": "Ada"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub current_step_id: Option<String>,

    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a field. The step pointer key is reserved and left untouched.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) -> bool {
        let key = key.into();
        if key == CURRENT_STEP_KEY {
            return false;
        }
        self.fields.insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Field as text, if it is a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    /// Whole context as a JSON object (used as prompt data)
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

/// A conversation between one user on one platform and a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub status: ConversationStatus,

    /// Flow in progress
    pub current_flow: Option<String>,

    #[serde(default)]
    pub context: ConversationContext,

    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    /// New active conversation with an empty step pointer
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        platform: impl Into<String>,
        flow_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            platform: platform.into(),
            status: ConversationStatus::Active,
            current_flow: Some(flow_name.into()),
            context: ConversationContext::new(),
            started_at: now,
            last_activity: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// Refresh `last_activity`
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn belongs_to(&self, user_id: &str, platform: &str) -> bool {
        self.user_id == user_id && self.platform == platform
    }
}

/// Pick the conversation that counts as *the* active one for a user.
///
/// More than one active row can exist after a race; the most recent by
/// `last_activity` wins.
pub fn latest_active<'a, I>(conversations: I, user_id: &str, platform: &str) -> Option<&'a Conversation>
where
    I: IntoIterator<Item = &'a Conversation>,
{
    conversations
        .into_iter()
        .filter(|c| c.is_active() && c.belongs_to(user_id, platform))
        .max_by_key(|c| c.last_activity)
}
