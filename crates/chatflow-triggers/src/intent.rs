//! IntentDetector - Language-model fallback classification
//!
//! Asks the model which active flow a message belongs to. The detector
//! never fails: transport errors, timeouts and unparseable answers all
//! come back as "no intent" with reasoning `error`.

use std::sync::Arc;
use std::time::Duration;

use chatflow_core::{ChatflowError, ChatflowResult, FlowSummary, LanguageModel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Reasoning reported for any failed classification
pub const ERROR_REASONING: &str = "error";

/// Detector tuning
#[derive(Debug, Clone)]
pub struct IntentDetectorConfig {
    /// Results below this confidence are reported as no intent
    pub threshold: f64,

    /// Upper bound for one model call
    pub timeout: Duration,

    pub max_tokens: u32,
}

impl Default for IntentDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            timeout: Duration::from_secs(10),
            max_tokens: 200,
        }
    }
}

/// Classification of one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    /// Accepted flow, `None` when nothing cleared the threshold
    pub flow_name: Option<String>,

    /// Model confidence in [0, 1]
    pub confidence: f64,

    pub reasoning: String,
}

impl IntentResult {
    /// The degraded result returned on any failure
    pub fn error() -> Self {
        Self {
            flow_name: None,
            confidence: 0.0,
            reasoning: ERROR_REASONING.to_string(),
        }
    }

    fn none(reasoning: impl Into<String>) -> Self {
        Self {
            flow_name: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// Shape the model is asked to produce
#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default, alias = "flow_name", alias = "flow")]
    #[serde(rename = "flowName")]
    flow_name: Option<String>,

    confidence: f64,

    #[serde(default)]
    reasoning: Option<String>,
}

/// Classifies free text against the active flows
#[derive(Clone)]
pub struct IntentDetector {
    model: Arc<dyn LanguageModel>,
    config: IntentDetectorConfig,
}

impl IntentDetector {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            config: IntentDetectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IntentDetectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &IntentDetectorConfig {
        &self.config
    }

    /// Pick the flow `message` most likely belongs to
    pub async fn detect_intent(&self, message: &str, active_flows: &[FlowSummary]) -> IntentResult {
        if active_flows.is_empty() {
            return IntentResult::none("no active flows");
        }

        match self.classify(message, active_flows).await {
            Ok(result) => {
                debug!(
                    flow = result.flow_name.as_deref().unwrap_or("<none>"),
                    confidence = result.confidence,
                    "Intent detected"
                );
                result
            }
            Err(e) => {
                warn!("Intent detection failed: {}", e);
                IntentResult::error()
            }
        }
    }

    async fn classify(&self, message: &str, active_flows: &[FlowSummary]) -> ChatflowResult<IntentResult> {
        let prompt = build_intent_prompt(message, active_flows);
        let raw = tokio::time::timeout(
            self.config.timeout,
            self.model.complete(&prompt, self.config.max_tokens),
        )
        .await
        .map_err(|_| {
            ChatflowError::timeout(format!(
                "intent detection timed out after {:?}",
                self.config.timeout
            ))
        })??;

        let parsed = parse_intent_response(&raw)?;
        Ok(self.accept(parsed, active_flows))
    }

    /// Clamp confidence, drop unknown flows, apply the threshold
    fn accept(&self, raw: RawIntent, active_flows: &[FlowSummary]) -> IntentResult {
        let confidence = raw.confidence.clamp(0.0, 1.0);
        let reasoning = raw.reasoning.unwrap_or_default();

        let flow_name = raw
            .flow_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("null"));

        let flow_name = match flow_name {
            Some(name) if active_flows.iter().any(|f| f.name == name) => Some(name),
            Some(name) => {
                warn!(flow = %name, "Model proposed a flow that is not active");
                None
            }
            None => None,
        };

        let flow_name = if confidence < self.config.threshold {
            None
        } else {
            flow_name
        };

        IntentResult {
            flow_name,
            confidence,
            reasoning,
        }
    }
}

/// Prompt listing the candidate flows and the user's message
pub fn build_intent_prompt(message: &str, active_flows: &[FlowSummary]) -> String {
    let flows = active_flows
        .iter()
        .map(|f| format!("- {}: {}", f.name, f.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Classify the user's message into one of the available conversation flows.\n\n\
         Available flows:\n{flows}\n\n\
         User message: \"{message}\"\n\n\
         Respond with JSON only, in this exact shape:\n\
         {{\"flowName\": \"<flow name or null>\", \"confidence\": <number between 0 and 1>, \"reasoning\": \"<one short sentence>\"}}"
    )
}

fn parse_intent_response(raw: &str) -> ChatflowResult<RawIntent> {
    let trimmed = raw.trim();
    let candidate = if serde_json::from_str::<Value>(trimmed).is_ok() {
        trimmed.to_string()
    } else if let Some(fenced) = extract_json_fence(trimmed) {
        fenced
    } else if let Some(object) = extract_json_object(trimmed) {
        object
    } else {
        return Err(ChatflowError::llm(format!(
            "intent response is not JSON: {}",
            truncate(trimmed, 120)
        )));
    };

    let parsed: RawIntent = serde_json::from_str(&candidate)?;
    if !parsed.confidence.is_finite() {
        return Err(ChatflowError::llm("intent confidence is not a number"));
    }
    Ok(parsed)
}

fn extract_json_fence(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after_start = &raw[start + 3..];
    let after_lang = &after_start[after_start.find('\n')? + 1..];
    let end = after_lang.rfind("```")?;
    let candidate = after_lang[..end].trim();
    candidate.starts_with('{').then(|| candidate.to_string())
}

fn extract_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| raw[start..=end].to_string())
}

fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: ChatflowResult<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(ChatflowError::llm("connection reset")),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(ChatflowError::llm(e.to_string())),
            }
        }
    }

    struct HangingModel;

    #[async_trait]
    impl LanguageModel for HangingModel {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(r#"{"flowName": "pricing", "confidence": 0.9}"#.into())
        }
    }

    fn flows() -> Vec<FlowSummary> {
        vec![
            FlowSummary {
                name: "pricing".into(),
                description: "Questions about plans and cost".into(),
            },
            FlowSummary {
                name: "support".into(),
                description: "Help with a broken account".into(),
            },
        ]
    }

    #[tokio::test]
    async fn test_confident_answer_is_accepted() {
        let model = ScriptedModel::ok(
            r#"{"flowName": "pricing", "confidence": 0.82, "reasoning": "asks about cost"}"#,
        );
        let detector = IntentDetector::new(model.clone());

        let result = detector.detect_intent("how much is it?", &flows()).await;
        assert_eq!(result.flow_name.as_deref(), Some("pricing"));
        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.reasoning, "asks about cost");

        let prompt = &model.prompts.lock().unwrap()[0];
        assert!(prompt.contains("- pricing: Questions about plans and cost"));
        assert!(prompt.contains("how much is it?"));
    }

    #[tokio::test]
    async fn test_low_confidence_is_no_intent() {
        let model = ScriptedModel::ok(r#"{"flowName": "pricing", "confidence": 0.49, "reasoning": "maybe"}"#);
        let result = IntentDetector::new(model).detect_intent("hmm", &flows()).await;

        assert_eq!(result.flow_name, None);
        assert_eq!(result.confidence, 0.49);
    }

    #[tokio::test]
    async fn test_fenced_json_is_parsed() {
        let model = ScriptedModel::ok(
            "Sure!\n```json\n{\"flowName\": \"support\", \"confidence\": 0.7, \"reasoning\": \"locked out\"}\n```",
        );
        let result = IntentDetector::new(model).detect_intent("I can't log in", &flows()).await;
        assert_eq!(result.flow_name.as_deref(), Some("support"));
    }

    #[tokio::test]
    async fn test_unknown_flow_is_dropped() {
        let model = ScriptedModel::ok(r#"{"flowName": "refunds", "confidence": 0.95}"#);
        let result = IntentDetector::new(model).detect_intent("money back", &flows()).await;
        assert_eq!(result.flow_name, None);
        assert_eq!(result.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_confidence_is_clamped() {
        let model = ScriptedModel::ok(r#"{"flowName": "pricing", "confidence": 7}"#);
        let result = IntentDetector::new(model).detect_intent("price", &flows()).await;
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.flow_name.as_deref(), Some("pricing"));
    }

    #[tokio::test]
    async fn test_failures_degrade_to_error_result() {
        let cases = vec![
            ScriptedModel::failing(),
            ScriptedModel::ok("I think it's pricing"),
            ScriptedModel::ok(r#"{"flowName": "pricing"}"#),
            ScriptedModel::ok(r#"{"flowName": "pricing", "confidence": "high"}"#),
        ];
        for model in cases {
            let result = IntentDetector::new(model).detect_intent("price", &flows()).await;
            assert_eq!(result, IntentResult::error());
        }
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_error_result() {
        let detector = IntentDetector::new(Arc::new(HangingModel)).with_config(IntentDetectorConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let result = detector.detect_intent("price", &flows()).await;
        assert_eq!(result, IntentResult::error());
    }

    #[tokio::test]
    async fn test_no_active_flows_skips_model() {
        let model = ScriptedModel::ok(r#"{"flowName": "pricing", "confidence": 1}"#);
        let result = IntentDetector::new(model.clone()).detect_intent("price", &[]).await;
        assert_eq!(result.flow_name, None);
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_null_flow_name() {
        let model = ScriptedModel::ok(r#"{"flowName": null, "confidence": 0.9, "reasoning": "small talk"}"#);
        let result = IntentDetector::new(model).detect_intent("hello there", &flows()).await;
        assert_eq!(result.flow_name, None);
        assert_eq!(result.reasoning, "small talk");
    }
}
