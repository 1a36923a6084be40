//! Step actions
//!
//! Actions run after a step's content is produced, in declared order. Each
//! one has its own error boundary: a failing action is logged and reported
//! but never stops the next action or the step's reply.

use std::sync::Arc;

use async_trait::async_trait;
use chatflow_core::{Action, ChatflowError, ChatflowResult, EventSink, Notifier, Step};
use serde_json::json;
use tracing::{debug, info, warn};

/// Event type recorded for `tag` actions
pub const TAG_EVENT: &str = "tag";

/// An action that failed while running a step
#[derive(Debug)]
pub struct ActionFailure {
    pub step_id: String,
    pub action: &'static str,
    pub error: ChatflowError,
}

/// Executes the actions attached to a step
#[derive(Clone)]
pub struct ActionRunner {
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
}

impl ActionRunner {
    pub fn new(events: Arc<dyn EventSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self { events, notifier }
    }

    /// Run every action of `step`; returns the failures, already logged
    pub async fn run(&self, conversation_id: &str, flow_name: &str, step: &Step) -> Vec<ActionFailure> {
        let mut failures = Vec::new();

        for action in &step.actions {
            if let Err(e) = self.run_one(conversation_id, flow_name, step, action).await {
                let error = ChatflowError::action(format!("{}: {}", action.kind(), e));
                warn!(
                    conversation_id,
                    flow = flow_name,
                    step = %step.id,
                    action = action.kind(),
                    "{}",
                    error
                );
                failures.push(ActionFailure {
                    step_id: step.id.clone(),
                    action: action.kind(),
                    error,
                });
            }
        }

        failures
    }

    async fn run_one(
        &self,
        conversation_id: &str,
        flow_name: &str,
        step: &Step,
        action: &Action,
    ) -> ChatflowResult<()> {
        match action {
            Action::Tag { value } => {
                self.events
                    .record_event(
                        conversation_id,
                        TAG_EVENT,
                        json!({"tag": value, "flow": flow_name, "step": step.id}),
                    )
                    .await
            }
            Action::Notify { message } => self.notifier.notify(conversation_id, message).await,
            Action::Track { event } => {
                self.events
                    .record_event(
                        conversation_id,
                        event,
                        json!({"flow": flow_name, "step": step.id}),
                    )
                    .await
            }
            Action::ApiCall { endpoint, .. } => {
                debug!(
                    conversation_id,
                    endpoint = endpoint.as_deref().unwrap_or("<unset>"),
                    "apiCall actions are reserved; skipping"
                );
                Ok(())
            }
        }
    }
}

/// Event sink that only logs; used when no analytics store is wired in
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn record_event(
        &self,
        conversation_id: &str,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> ChatflowResult<()> {
        info!(conversation_id, event_type, %metadata, "Event");
        Ok(())
    }
}

/// Notifier that writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, conversation_id: &str, message: &str) -> ChatflowResult<()> {
        info!(conversation_id, "Notification: {}", message);
        Ok(())
    }
}
