//! Outbound response entries handed to the transport layer

use serde::{Deserialize, Serialize};

use crate::flow::ButtonOption;

/// One entry of a turn's reply
///
/// Transports render these in order, e.g. a `Message` as a text bubble and
/// `Buttons` as a reply keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlowResponse {
    Message { content: String },
    Buttons { options: Vec<ButtonChoice> },
}

/// Button as shown to the user; routing targets are stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonChoice {
    pub label: String,
    pub value: String,
}

impl From<&ButtonOption> for ButtonChoice {
    fn from(option: &ButtonOption) -> Self {
        Self {
            label: option.label.clone(),
            value: option.value.clone(),
        }
    }
}

impl FlowResponse {
    pub fn message(content: impl Into<String>) -> Self {
        Self::Message {
            content: content.into(),
        }
    }

    pub fn buttons(options: &[ButtonOption]) -> Self {
        Self::Buttons {
            options: options.iter().map(ButtonChoice::from).collect(),
        }
    }

    /// Text of a message entry
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Message { content } => Some(content),
            Self::Buttons { .. } => None,
        }
    }
}

/// Result of one engine turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResult {
    pub conversation_id: String,

    /// Entries to deliver, in order
    pub responses: Vec<FlowResponse>,

    /// The conversation reached its end during this turn
    pub completed: bool,
}

impl TurnResult {
    /// Turn that ended the conversation without emitting anything
    pub fn ended(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            responses: Vec::new(),
            completed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_buttons_strip_routing() {
        let options = vec![ButtonOption {
            label: "1-10".into(),
            value: "small".into(),
            next: Some("small_path".into()),
        }];
        let entry = FlowResponse::buttons(&options);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"type": "buttons", "options": [{"label": "1-10", "value": "small"}]})
        );
    }

    #[test]
    fn test_message_shape() {
        let entry = FlowResponse::message("hi");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"type": "message", "content": "hi"})
        );
        assert_eq!(entry.as_text(), Some("hi"));
    }
}
