//! Chatflow LLM - Language model clients
//!
//! Provides [`AnthropicClient`] and [`build_model`], which turns an
//! [`LlmConfig`] into a shared `LanguageModel`. A missing API key yields a
//! [`DisabledModel`](chatflow_core::DisabledModel) so the engine keeps working
//! with its static fallbacks.

pub mod anthropic;
pub mod config;

use std::sync::Arc;

use chatflow_core::{ChatflowResult, DisabledModel, LanguageModel};
use tracing::{info, warn};

pub use anthropic::AnthropicClient;
pub use config::{LlmConfig, LlmProvider};

/// Build the configured language model
pub fn build_model(config: &LlmConfig) -> ChatflowResult<Arc<dyn LanguageModel>> {
    match config.provider {
        LlmProvider::Disabled => {
            info!("Language model disabled by configuration");
            Ok(Arc::new(DisabledModel))
        }
        LlmProvider::Anthropic => match config.api_key() {
            Some(key) => {
                info!("Using Anthropic model {}", config.model);
                Ok(Arc::new(AnthropicClient::new(config, key)?))
            }
            None => {
                warn!(
                    "{} is not set; intent detection and dynamic content are disabled",
                    config.api_key_env
                );
                Ok(Arc::new(DisabledModel))
            }
        },
    }
}
