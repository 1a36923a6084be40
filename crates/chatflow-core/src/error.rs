//! Error types shared by every chatflow crate

use thiserror::Error;

/// Result alias used across the engine
pub type ChatflowResult<T> = Result<T, ChatflowError>;

/// Engine error taxonomy
///
/// Variants fall into four groups that callers treat differently:
/// configuration, state, integration and action errors.
#[derive(Debug, Error)]
pub enum ChatflowError {
    #[error("Flow not found or inactive: {0}")]
    FlowNotFound(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Conversation {conversation_id} points at unknown step '{step_id}'")]
    InvalidFlowState {
        conversation_id: String,
        step_id: String,
    },

    #[error("Invalid trigger '{pattern}' in flow {flow}: {reason}")]
    InvalidTrigger {
        flow: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid flow definition: {0}")]
    InvalidFlow(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Action failed: {0}")]
    Action(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChatflowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn action(msg: impl Into<String>) -> Self {
        Self::Action(msg.into())
    }

    pub fn invalid_flow(msg: impl Into<String>) -> Self {
        Self::InvalidFlow(msg.into())
    }

    /// Unknown/inactive flow or a malformed definition
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::FlowNotFound(_) | Self::InvalidTrigger { .. } | Self::InvalidFlow(_) | Self::Config(_)
        )
    }

    /// The conversation can no longer be advanced and should be restarted
    pub fn is_state(&self) -> bool {
        matches!(self, Self::ConversationNotFound(_) | Self::InvalidFlowState { .. })
    }

    /// Failures talking to the language model
    pub fn is_integration(&self) -> bool {
        matches!(self, Self::Llm(_) | Self::Timeout(_))
    }
}

impl From<serde_json::Error> for ChatflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
