//! Storage collaborator traits
//!
//! The engine never talks to a database directly. Flow definitions come from
//! a [`FlowRepository`], conversation rows from a [`ConversationRepository`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::{Conversation, ConversationContext};
use crate::error::ChatflowResult;
use crate::flow::{FlowDefinition, FlowSummary};

/// Read-only source of flow definitions
#[async_trait]
pub trait FlowRepository: Send + Sync {
    /// Active flow by name; inactive or unknown flows yield `None`
    async fn get_flow_by_name(&self, name: &str) -> ChatflowResult<Option<Arc<FlowDefinition>>>;

    /// Name and description of every active flow
    async fn list_active_flows(&self) -> ChatflowResult<Vec<FlowSummary>>;

    /// Full definitions of every active flow, in registration order
    async fn active_definitions(&self) -> ChatflowResult<Vec<Arc<FlowDefinition>>>;
}

/// CRUD over conversation rows
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Most recent active conversation (by `last_activity`) for the pair
    async fn get_active_conversation(
        &self,
        user_id: &str,
        platform: &str,
    ) -> ChatflowResult<Option<Conversation>>;

    /// Insert a new active conversation and return its id
    async fn create(&self, user_id: &str, platform: &str, flow_name: &str) -> ChatflowResult<String>;

    async fn get_by_id(&self, id: &str) -> ChatflowResult<Option<Conversation>>;

    /// Replace the context and refresh `last_activity`
    async fn update_context(&self, id: &str, context: &ConversationContext) -> ChatflowResult<()>;

    async fn mark_completed(&self, id: &str) -> ChatflowResult<()>;

    async fn mark_abandoned(&self, id: &str) -> ChatflowResult<()>;
}
