//! chatflowctl configuration file
//!
//! ```yaml
//! apiVersion: chatflow.dev/v1
//! kind: ChatflowConfig
//! metadata:
//!   name: sales-bot
//! spec:
//!   flows:
//!     directory: ./flows
//!   store:
//!     path: ./data/conversations.json
//!     idleTimeoutMins: 60
//!   events:
//!     path: ./data/events.jsonl
//!   llm:
//!     provider: anthropic
//!     model: claude-3-5-haiku-latest
//!   intent:
//!     enabled: true
//!     threshold: 0.5
//!   router:
//!     fallbackMessage: "Sorry, please try again."
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chatflow_llm::LlmConfig;
use chatflow_runtime::executor::DEFAULT_DYNAMIC_INSTRUCTIONS;
use chatflow_runtime::FlowExecutorConfig;
use chatflow_triggers::{IntentDetectorConfig, RouterConfig};
use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "chatflow.dev/v1";
pub const KIND: &str = "ChatflowConfig";

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatflowConfig {
    /// API version (chatflow.dev/v1)
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    /// Kind (ChatflowConfig)
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: ChatflowSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatflowSpec {
    pub flows: FlowsConfig,
    pub store: StoreConfig,
    pub events: EventsConfig,
    pub llm: LlmConfig,
    pub intent: IntentConfig,
    pub dynamic: DynamicConfig,
    pub router: RouterSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowsConfig {
    #[serde(default = "default_flows_dir")]
    pub directory: PathBuf,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            directory: default_flows_dir(),
        }
    }
}

/// Conversation storage; in-memory when `path` is absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub path: Option<PathBuf>,

    /// Abandon active conversations idle for longer than this on startup
    pub idle_timeout_mins: Option<u64>,
}

/// Analytics events; in-memory when `path` is absent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for IntentConfig {
    fn default() -> Self {
        let defaults = IntentDetectorConfig::default();
        Self {
            enabled: true,
            threshold: defaults.threshold,
            timeout_secs: defaults.timeout.as_secs(),
            max_tokens: defaults.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DynamicConfig {
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub instructions: String,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_tokens: 500,
            instructions: DEFAULT_DYNAMIC_INSTRUCTIONS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSection {
    pub fallback_message: String,
    pub no_match_message: Option<String>,
}

impl Default for RouterSection {
    fn default() -> Self {
        let defaults = RouterConfig::default();
        Self {
            fallback_message: defaults.fallback_message,
            no_match_message: defaults.no_match_message,
        }
    }
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

fn default_flows_dir() -> PathBuf {
    PathBuf::from("flows")
}

impl Default for ChatflowConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ConfigMetadata::default(),
            spec: ChatflowSpec::default(),
        }
    }
}

impl ChatflowConfig {
    /// Load from `path`, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        if config.kind != KIND {
            anyhow::bail!("Expected kind {}, found {}", KIND, config.kind);
        }
        if config.api_version != API_VERSION {
            tracing::warn!("Unknown apiVersion {}; reading as {}", config.api_version, API_VERSION);
        }
        Ok(config)
    }

    pub fn intent_config(&self) -> IntentDetectorConfig {
        IntentDetectorConfig {
            threshold: self.spec.intent.threshold,
            timeout: Duration::from_secs(self.spec.intent.timeout_secs),
            max_tokens: self.spec.intent.max_tokens,
        }
    }

    pub fn executor_config(&self) -> FlowExecutorConfig {
        FlowExecutorConfig {
            dynamic_timeout: Duration::from_secs(self.spec.dynamic.timeout_secs),
            dynamic_max_tokens: self.spec.dynamic.max_tokens,
            default_dynamic_instructions: self.spec.dynamic.instructions.clone(),
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            fallback_message: self.spec.router.fallback_message.clone(),
            no_match_message: self.spec.router.no_match_message.clone(),
        }
    }
}
