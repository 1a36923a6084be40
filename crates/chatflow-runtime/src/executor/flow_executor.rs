//! Flow Executor - Conversation state machine
//!
//! Drives a conversation through a flow one user turn at a time:
//! - `start_flow` creates the conversation and runs the first step
//! - `continue_flow` saves the answer, resolves the next step and runs it
//! - `execute_step` produces content, buttons and actions for one step
//!
//! Turns for the same conversation are serialized with a per-conversation
//! lock, so concurrent messages cannot clobber `currentStepId`.

use std::sync::Arc;
use std::time::Duration;

use chatflow_core::{
    ChatflowError, ChatflowResult, ConversationContext, ConversationRepository, DisabledModel,
    EventSink, FlowDefinition, FlowRepository, FlowResponse, LanguageModel, Notifier, Step,
    StepKind, TurnResult,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::actions::{ActionRunner, TracingEventSink, TracingNotifier};
use super::dynamic::{ContentGenerator, DEFAULT_DYNAMIC_INSTRUCTIONS};
use crate::locks::KeyedLocks;

/// Events emitted while executing flows
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Conversation created for a flow
    Started {
        conversation_id: String,
        flow_name: String,
    },

    /// A step produced its reply
    StepExecuted {
        conversation_id: String,
        step_id: String,
        step_type: &'static str,
    },

    /// A user answer was written into the context
    AnswerSaved {
        conversation_id: String,
        field: String,
    },

    /// An action failed (the step still completed)
    ActionFailed {
        conversation_id: String,
        step_id: String,
        action: &'static str,
        error: String,
    },

    /// Conversation marked completed
    Completed { conversation_id: String },
}

/// Executor tuning
#[derive(Debug, Clone)]
pub struct FlowExecutorConfig {
    /// Upper bound for one dynamic-content model call
    pub dynamic_timeout: Duration,

    pub dynamic_max_tokens: u32,

    /// Used when a dynamic step has no `dynamicInstructions`
    pub default_dynamic_instructions: String,
}

impl Default for FlowExecutorConfig {
    fn default() -> Self {
        Self {
            dynamic_timeout: Duration::from_secs(10),
            dynamic_max_tokens: 500,
            default_dynamic_instructions: DEFAULT_DYNAMIC_INSTRUCTIONS.to_string(),
        }
    }
}

/// Flow execution engine
pub struct FlowExecutor {
    flows: Arc<dyn FlowRepository>,
    conversations: Arc<dyn ConversationRepository>,
    model: Arc<dyn LanguageModel>,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    config: FlowExecutorConfig,
    content: ContentGenerator,
    actions: ActionRunner,
    locks: KeyedLocks,
    event_tx: Option<mpsc::Sender<FlowEvent>>,
}

impl FlowExecutor {
    /// Create an executor with no language model and log-only side effects
    pub fn new(flows: Arc<dyn FlowRepository>, conversations: Arc<dyn ConversationRepository>) -> Self {
        let model: Arc<dyn LanguageModel> = Arc::new(DisabledModel);
        let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
        let config = FlowExecutorConfig::default();

        Self {
            flows,
            conversations,
            content: Self::content_generator(&model, &config),
            actions: ActionRunner::new(events.clone(), notifier.clone()),
            model,
            events,
            notifier,
            config,
            locks: KeyedLocks::new(),
            event_tx: None,
        }
    }

    fn content_generator(model: &Arc<dyn LanguageModel>, config: &FlowExecutorConfig) -> ContentGenerator {
        ContentGenerator::new(
            model.clone(),
            config.dynamic_timeout,
            config.dynamic_max_tokens,
            config.default_dynamic_instructions.clone(),
        )
    }

    /// Set the language model used for dynamic steps
    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.content = Self::content_generator(&model, &self.config);
        self.model = model;
        self
    }

    pub fn with_config(mut self, config: FlowExecutorConfig) -> Self {
        self.content = Self::content_generator(&self.model, &config);
        self.config = config;
        self
    }

    /// Set the sink for `track` and `tag` actions
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.actions = ActionRunner::new(events.clone(), self.notifier.clone());
        self.events = events;
        self
    }

    /// Set the target of `notify` actions
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.actions = ActionRunner::new(self.events.clone(), notifier.clone());
        self.notifier = notifier;
        self
    }

    /// Add event channel for monitoring
    pub fn with_event_channel(mut self, tx: mpsc::Sender<FlowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn flows(&self) -> &Arc<dyn FlowRepository> {
        &self.flows
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationRepository> {
        &self.conversations
    }

    /// Start `flow_name` for a user and run its first step.
    ///
    /// Does not look for an existing active conversation; the router decides
    /// between starting and continuing.
    pub async fn start_flow(
        &self,
        user_id: &str,
        platform: &str,
        flow_name: &str,
    ) -> ChatflowResult<TurnResult> {
        let flow = self
            .flows
            .get_flow_by_name(flow_name)
            .await?
            .ok_or_else(|| ChatflowError::FlowNotFound(flow_name.to_string()))?;

        let first = flow.first_step().ok_or_else(|| {
            ChatflowError::invalid_flow(format!("flow '{}' has no steps", flow.name))
        })?;

        let conversation_id = self.conversations.create(user_id, platform, &flow.name).await?;
        let _turn = self.locks.lock(&conversation_id).await;

        info!(
            conversation_id = %conversation_id,
            flow = %flow.name,
            user_id,
            platform,
            "Starting flow"
        );
        self.emit_event(FlowEvent::Started {
            conversation_id: conversation_id.clone(),
            flow_name: flow.name.clone(),
        });

        let mut context = ConversationContext::new();
        context.current_step_id = Some(first.id.clone());
        self.conversations.update_context(&conversation_id, &context).await?;

        let responses = self
            .execute_step(&conversation_id, &flow, first, Some(&context))
            .await?;

        Ok(TurnResult {
            conversation_id,
            responses,
            completed: first.is_end(),
        })
    }

    /// Feed a user answer into an active conversation
    pub async fn continue_flow(&self, conversation_id: &str, user_input: &str) -> ChatflowResult<TurnResult> {
        let _turn = self.locks.lock(conversation_id).await;

        let conversation = self
            .conversations
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| ChatflowError::ConversationNotFound(conversation_id.to_string()))?;

        if !conversation.is_active() {
            debug!(conversation_id, status = %conversation.status, "Conversation already closed");
            return Ok(TurnResult::ended(conversation_id));
        }

        let mut context = conversation.context;
        let current_step_id = context.current_step_id.clone().unwrap_or_default();

        let flow_name = conversation.current_flow.ok_or_else(|| ChatflowError::InvalidFlowState {
            conversation_id: conversation_id.to_string(),
            step_id: current_step_id.clone(),
        })?;
        let flow = self
            .flows
            .get_flow_by_name(&flow_name)
            .await?
            .ok_or_else(|| ChatflowError::FlowNotFound(flow_name.clone()))?;

        let current = flow
            .step(&current_step_id)
            .ok_or_else(|| ChatflowError::InvalidFlowState {
                conversation_id: conversation_id.to_string(),
                step_id: current_step_id.clone(),
            })?;

        // Raw text is stored even for button answers
        if let Some(field) = current.save_as() {
            if context.set(field, serde_json::Value::String(user_input.to_string())) {
                self.emit_event(FlowEvent::AnswerSaved {
                    conversation_id: conversation_id.to_string(),
                    field: field.to_string(),
                });
            } else {
                warn!(conversation_id, step = %current.id, "saveAs targets a reserved key; answer dropped");
            }
        }

        let next = current.resolve_next(user_input).and_then(|id| flow.step(id));
        let Some(next) = next else {
            debug!(
                conversation_id,
                step = %current.id,
                "No resolvable next step; ending conversation"
            );
            self.conversations.update_context(conversation_id, &context).await?;
            self.complete(conversation_id).await?;
            return Ok(TurnResult::ended(conversation_id));
        };

        context.current_step_id = Some(next.id.clone());
        self.conversations.update_context(conversation_id, &context).await?;

        let responses = self
            .execute_step(conversation_id, &flow, next, Some(&context))
            .await?;

        Ok(TurnResult {
            conversation_id: conversation_id.to_string(),
            responses,
            completed: next.is_end(),
        })
    }

    /// Produce the reply for one step, run its actions, and complete the
    /// conversation if it is an `end` step.
    pub async fn execute_step(
        &self,
        conversation_id: &str,
        flow: &FlowDefinition,
        step: &Step,
        context: Option<&ConversationContext>,
    ) -> ChatflowResult<Vec<FlowResponse>> {
        debug!(conversation_id, flow = %flow.name, step = %step.id, "Executing step");

        let content = match context {
            Some(ctx) if step.dynamic => self.content.generate(step, ctx).await,
            _ => step.content.clone(),
        };

        let mut responses = vec![FlowResponse::message(content)];

        if let StepKind::Question { options, .. } = &step.kind {
            if !options.is_empty() {
                responses.push(FlowResponse::buttons(options));
            }
        }

        for failure in self.actions.run(conversation_id, &flow.name, step).await {
            self.emit_event(FlowEvent::ActionFailed {
                conversation_id: conversation_id.to_string(),
                step_id: failure.step_id,
                action: failure.action,
                error: failure.error.to_string(),
            });
        }

        self.emit_event(FlowEvent::StepExecuted {
            conversation_id: conversation_id.to_string(),
            step_id: step.id.clone(),
            step_type: step.type_name(),
        });

        if step.is_end() {
            self.complete(conversation_id).await?;
        }

        Ok(responses)
    }

    async fn complete(&self, conversation_id: &str) -> ChatflowResult<()> {
        self.conversations.mark_completed(conversation_id).await?;
        info!(conversation_id, "Conversation completed");
        self.emit_event(FlowEvent::Completed {
            conversation_id: conversation_id.to_string(),
        });
        Ok(())
    }

    /// Send an event without ever blocking the turn
    fn emit_event(&self, event: FlowEvent) {
        if let Some(ref tx) = self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!("Dropped flow event: {}", e);
            }
        }
    }
}
