//! Language model collaborator

use async_trait::async_trait;

use crate::error::{ChatflowError, ChatflowResult};

/// Text completion service shared by intent detection and dynamic content
///
/// Implementations may enforce their own transport timeout; callers also
/// bound every call with `tokio::time::timeout`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> ChatflowResult<String>;
}

/// Stand-in used when no model is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
        Err(ChatflowError::llm("no language model configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_model_errors() {
        let err = DisabledModel.complete("hello", 10).await.unwrap_err();
        assert!(err.is_integration());
    }
}
