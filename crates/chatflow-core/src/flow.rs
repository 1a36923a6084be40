// Chatflow Core - Flow definition types
//
// A flow is a declarative conversation script: an ordered list of steps
// (messages, questions, end markers) plus the trigger keywords that route
// free text into it. Flows are read-only to the engine; they are authored
// as YAML files or seeded by an administrative process.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ChatflowError, ChatflowResult};

/// FlowDefinition - a named multi-step conversation script
///
/// Example:
/// ```yaml
/// name: pricing_inquiry
/// description: "Answer pricing questions and qualify the lead"
/// triggerKeywords:
///   - keyword: cost
///     matchType: contains
///     priority: 8
/// steps:
///   - id: ask_company_size
///     type: question
///     content: "How big is your team?"
///     inputType: buttons
///     saveAs: company_size
///     options:
///       - { label: "1-10", value: small, next: small_path }
///       - { label: "11-50", value: medium, next: medium_path }
///     next: generic_path
///   - id: small_path
///     type: end
///     content: "Our Starter plan fits you best."
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    /// Unique flow name
    pub name: String,

    /// Human-readable summary, shown to the intent classifier
    #[serde(default)]
    pub description: String,

    /// Inactive flows are invisible to matching, classification and lookup
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Keywords and patterns that start this flow
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trigger_keywords: Vec<TriggerKeyword>,

    /// Ordered steps; the first one runs when the flow starts
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

/// Name and description of an active flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub name: String,
    pub description: String,
}

impl FlowDefinition {
    /// Parse a flow from YAML, reporting the path of the offending field on error
    pub fn from_yaml_str(content: &str) -> ChatflowResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(content);
        serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let path = e.path().to_string();
            ChatflowError::invalid_flow(format!("{} (at {})", e.into_inner(), path))
        })
    }

    /// First step of the flow, if any
    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    /// Find a step by id
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn summary(&self) -> FlowSummary {
        FlowSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    /// Validate structural invariants.
    ///
    /// Hard errors: empty name, no steps, empty or duplicate step ids.
    /// Dangling `next` targets are returned as warnings because at run time
    /// they simply end the conversation.
    pub fn validate(&self) -> ChatflowResult<Vec<String>> {
        if self.name.trim().is_empty() {
            return Err(ChatflowError::invalid_flow("flow name is empty"));
        }
        if self.steps.is_empty() {
            return Err(ChatflowError::invalid_flow(format!(
                "flow '{}' has no steps",
                self.name
            )));
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(ChatflowError::invalid_flow(format!(
                    "flow '{}' has a step with an empty id",
                    self.name
                )));
            }
            if !ids.insert(step.id.as_str()) {
                return Err(ChatflowError::invalid_flow(format!(
                    "flow '{}' has duplicate step id '{}'",
                    self.name, step.id
                )));
            }
        }

        let mut warnings = Vec::new();
        for step in &self.steps {
            let targets = step
                .next()
                .into_iter()
                .chain(step.options().iter().filter_map(|o| o.next.as_deref()));
            for target in targets {
                if !ids.contains(target) {
                    warnings.push(format!(
                        "step '{}' points at unknown step '{}'",
                        step.id, target
                    ));
                }
            }
        }

        for trigger in &self.trigger_keywords {
            if trigger.keyword.is_empty() {
                warnings.push("empty trigger keyword is ignored".to_string());
            }
        }

        Ok(warnings)
    }
}

/// How a trigger keyword is compared against inbound text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Whole normalized message equals the keyword
    Exact,
    /// Normalized message contains the keyword
    #[default]
    Contains,
    /// Pattern is a regular expression tested against the raw message
    Regex,
}

/// A keyword or pattern that routes text to a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerKeyword {
    #[serde(alias = "pattern")]
    pub keyword: String,

    #[serde(default)]
    pub match_type: MatchType,

    #[serde(default)]
    pub case_sensitive: bool,

    /// Higher wins when several triggers match
    #[serde(default)]
    pub priority: i32,
}

impl TriggerKeyword {
    pub fn new(keyword: impl Into<String>, match_type: MatchType, priority: i32) -> Self {
        Self {
            keyword: keyword.into(),
            match_type,
            case_sensitive: false,
            priority,
        }
    }
}

/// One node of a flow's step graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique id within the flow
    pub id: String,

    #[serde(flatten)]
    pub kind: StepKind,

    /// Text emitted when the step runs (template for dynamic steps)
    #[serde(default)]
    pub content: String,

    /// Side effects executed after the content is produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,

    /// Generate the content with the language model
    #[serde(default)]
    pub dynamic: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_instructions: Option<String>,
}

/// Step variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StepKind {
    /// Emit text and move on
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },

    /// Emit text and wait for the user's answer
    Question {
        #[serde(default)]
        input_type: InputType,

        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<ButtonOption>,

        /// Context field receiving the raw answer
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_as: Option<String>,

        /// Fallback target when no option matches
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },

    /// Emit closing text and complete the conversation
    End,
}

/// How a question expects to be answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Buttons,
}

/// A selectable answer of a button question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonOption {
    #[serde(deserialize_with = "scalar_string")]
    pub label: String,
    #[serde(deserialize_with = "scalar_string")]
    pub value: String,

    /// Routing target; never sent to the transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Read an unquoted YAML scalar (`value: 1`, `label: true`) as its text
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Signed(i64),
        Unsigned(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Signed(n) => n.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

impl ButtonOption {
    /// Case-insensitive match on label or value
    pub fn matches(&self, input: &str) -> bool {
        let input = input.to_lowercase();
        self.label.to_lowercase() == input || self.value.to_lowercase() == input
    }
}

impl Step {
    /// Declared `next` target
    pub fn next(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Message { next } | StepKind::Question { next, .. } => next.as_deref(),
            StepKind::End => None,
        }
    }

    /// Context field that stores the user's answer to this step
    pub fn save_as(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Question { save_as, .. } => save_as.as_deref(),
            _ => None,
        }
    }

    pub fn options(&self) -> &[ButtonOption] {
        match &self.kind {
            StepKind::Question { options, .. } => options,
            _ => &[],
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, StepKind::End)
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            StepKind::Message { .. } => "message",
            StepKind::Question { .. } => "question",
            StepKind::End => "end",
        }
    }

    /// Pick the next step id for a user answer.
    ///
    /// Button questions scan their options in declared order and take the
    /// first label/value match; anything else falls back to `next`.
    pub fn resolve_next(&self, input: &str) -> Option<&str> {
        if let StepKind::Question {
            input_type: InputType::Buttons,
            options,
            next,
            ..
        } = &self.kind
        {
            return match options.iter().find(|o| o.matches(input)) {
                Some(option) => option.next.as_deref(),
                None => next.as_deref(),
            };
        }
        self.next()
    }
}

/// Side effect attached to a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Label the contact behind the conversation
    Tag { value: String },

    /// Send a notification to the operators
    Notify { message: String },

    /// Record an analytics event
    Track { event: String },

    /// Reserved for outbound API calls; not executed by the engine
    ApiCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tag { .. } => "tag",
            Self::Notify { .. } => "notify",
            Self::Track { .. } => "track",
            Self::ApiCall { .. } => "apiCall",
        }
    }
}
