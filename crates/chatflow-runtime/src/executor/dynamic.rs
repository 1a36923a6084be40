//! Model-generated step content
//!
//! A `dynamic` step uses its static `content` as a template and asks the
//! language model to personalize it from the conversation context. The
//! static content is always the fallback: a model error, a timeout, or an
//! empty answer never fails the turn.

use std::sync::Arc;
use std::time::Duration;

use chatflow_core::{ConversationContext, LanguageModel, Step};
use tracing::{debug, warn};

pub const DEFAULT_DYNAMIC_INSTRUCTIONS: &str = "Personalize the message based on user context";

/// Generates content for dynamic steps
#[derive(Clone)]
pub struct ContentGenerator {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    max_tokens: u32,
    default_instructions: String,
}

impl ContentGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        timeout: Duration,
        max_tokens: u32,
        default_instructions: impl Into<String>,
    ) -> Self {
        Self {
            model,
            timeout,
            max_tokens,
            default_instructions: default_instructions.into(),
        }
    }

    /// Content for `step`: generated when possible, static otherwise
    pub async fn generate(&self, step: &Step, context: &ConversationContext) -> String {
        let instructions = step
            .dynamic_instructions
            .as_deref()
            .unwrap_or(&self.default_instructions);
        let prompt = build_prompt(&step.content, context, instructions);

        match tokio::time::timeout(self.timeout, self.model.complete(&prompt, self.max_tokens)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!(step = %step.id, "Dynamic content was empty; using static content");
                    step.content.clone()
                } else {
                    debug!(step = %step.id, "Generated dynamic content");
                    text.to_string()
                }
            }
            Ok(Err(e)) => {
                warn!(step = %step.id, "Dynamic content failed, using static content: {}", e);
                step.content.clone()
            }
            Err(_) => {
                warn!(
                    step = %step.id,
                    "Dynamic content timed out after {:?}; using static content",
                    self.timeout
                );
                step.content.clone()
            }
        }
    }
}

/// Prompt combining the template, the context as JSON, and the instructions
pub fn build_prompt(template: &str, context: &ConversationContext, instructions: &str) -> String {
    let context_json =
        serde_json::to_string_pretty(&context.to_value()).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are writing the next message of a customer chat conversation.\n\n\
         Message template:\n{template}\n\n\
         What we know about the user (JSON):\n{context_json}\n\n\
         Instructions: {instructions}\n\n\
         Reply with the final message text only, without quotes or commentary."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatflow_core::{ChatflowError, ChatflowResult};
    use serde_json::json;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
            Err(ChatflowError::llm("503"))
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
    }

    fn dynamic_step() -> Step {
        serde_json::from_value(json!({
            "id": "welcome",
            "type": "message",
            "content": "Welcome aboard!",
            "dynamic": true
        }))
        .unwrap()
    }

    fn generator(model: Arc<dyn LanguageModel>) -> ContentGenerator {
        ContentGenerator::new(
            model,
            Duration::from_millis(50),
            100,
            DEFAULT_DYNAMIC_INSTRUCTIONS,
        )
    }

    #[tokio::test]
    async fn test_generated_text_is_trimmed() {
        let gen = generator(Arc::new(FixedModel("  Welcome aboard, Ada!\n")));
        let text = gen.generate(&dynamic_step(), &ConversationContext::new()).await;
        assert_eq!(text, "Welcome aboard, Ada!");
    }

    #[tokio::test]
    async fn test_model_error_falls_back() {
        let gen = generator(Arc::new(FailingModel));
        let text = gen.generate(&dynamic_step(), &ConversationContext::new()).await;
        assert_eq!(text, "Welcome aboard!");
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let gen = generator(Arc::new(SlowModel));
        let text = gen.generate(&dynamic_step(), &ConversationContext::new()).await;
        assert_eq!(text, "Welcome aboard!");
    }

    #[tokio::test]
    async fn test_blank_output_falls_back() {
        let gen = generator(Arc::new(FixedModel("   ")));
        let text = gen.generate(&dynamic_step(), &ConversationContext::new()).await;
        assert_eq!(text, "Welcome aboard!");
    }

    #[test]
    fn test_prompt_contains_template_context_and_instructions() {
        let mut ctx = ConversationContext::new();
        ctx.current_step_id = Some("welcome".into());
        ctx.set("name", json!("Ada"));

        let prompt = build_prompt("Welcome aboard!", &ctx, "Use their first name");
        assert!(prompt.contains("Welcome aboard!"));
        assert!(prompt.contains("\"name\": \"Ada\""));
        assert!(prompt.contains("Use their first name"));
    }
}
