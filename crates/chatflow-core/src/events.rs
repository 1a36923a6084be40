//! Side-effect sinks used by step actions

use async_trait::async_trait;

use crate::error::ChatflowResult;

/// Destination for analytics events (`track` and `tag` actions)
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record_event(
        &self,
        conversation_id: &str,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> ChatflowResult<()>;
}

/// Destination for operator notifications (`notify` actions)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, conversation_id: &str, message: &str) -> ChatflowResult<()>;
}
