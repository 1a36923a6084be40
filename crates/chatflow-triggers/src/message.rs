//! Inbound message as handed over by a transport

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message from a platform, already reduced to `(user, platform, text)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Unique message ID
    pub id: String,

    /// Platform name (telegram, whatsapp, web, etc.)
    pub platform: String,

    /// Platform-specific user ID
    pub user_id: String,

    /// Display name, when the platform provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Message text content
    pub text: String,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Additional platform-specific metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    /// Create a new inbound message with a generated id
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            platform: platform.into(),
            user_id: user_id.into(),
            user_name: None,
            text: text.into(),
            timestamp: chrono::Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Use the platform's own message id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Add metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Key identifying the sender across messages
    pub fn sender_key(&self) -> String {
        format!("{}:{}", self.platform, self.user_id)
    }

    /// Check if message is a command (starts with /)
    pub fn is_command(&self) -> bool {
        self.text.trim().starts_with('/')
    }
}
