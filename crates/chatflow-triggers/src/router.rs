//! MessageRouter - Turns an inbound message into a conversation turn
//!
//! Routing order for one message:
//! 1. An active conversation for the sender is continued
//! 2. Otherwise the keyword matcher picks a flow to start
//! 3. Otherwise the intent detector (when configured) picks one
//! 4. Otherwise nothing starts and the no-match reply (if any) is sent
//!
//! Engine failures never reach the user as error text; they become the
//! configured fallback message.

use std::sync::Arc;

use chatflow_core::{ChatflowError, ChatflowResult, FlowResponse, TurnResult};
use chatflow_runtime::{FlowExecutor, KeyedLocks};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::intent::IntentDetector;
use crate::keyword::{KeywordMatcher, LoadReport};
use crate::message::InboundMessage;

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Reply sent when the engine fails mid-turn
    pub fallback_message: String,

    /// Reply sent when no flow matches; silence when `None`
    pub no_match_message: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fallback_message: "Sorry, something went wrong on our side. Please try again in a moment."
                .to_string(),
            no_match_message: None,
        }
    }
}

/// How a message was routed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Route {
    /// Fed into the sender's active conversation
    Continued,

    /// Started a flow through a keyword trigger
    Keyword { flow: String, priority: i32 },

    /// Started a flow through intent detection
    Intent { flow: String, confidence: f64 },

    /// Nothing matched
    NoMatch,

    /// The engine failed and the fallback message was sent
    Fallback,
}

/// What the transport should send back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOutcome {
    /// Conversation that handled the message, if any
    pub conversation_id: Option<String>,

    pub responses: Vec<FlowResponse>,

    pub route: Route,

    /// The conversation completed during this turn
    pub completed: bool,
}

impl RouteOutcome {
    fn from_turn(turn: TurnResult, route: Route) -> Self {
        Self {
            conversation_id: Some(turn.conversation_id),
            responses: turn.responses,
            route,
            completed: turn.completed,
        }
    }
}

/// Routes inbound messages to the flow executor
pub struct MessageRouter {
    executor: Arc<FlowExecutor>,
    matcher: KeywordMatcher,
    intent: Option<IntentDetector>,
    config: RouterConfig,
    senders: KeyedLocks,
}

impl MessageRouter {
    /// Create a router with an empty keyword table; call `reload_triggers`
    pub fn new(executor: Arc<FlowExecutor>) -> Self {
        Self {
            executor,
            matcher: KeywordMatcher::new(),
            intent: None,
            config: RouterConfig::default(),
            senders: KeyedLocks::new(),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable the intent fallback
    pub fn with_intent_detector(mut self, detector: IntentDetector) -> Self {
        self.intent = Some(detector);
        self
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn executor(&self) -> &Arc<FlowExecutor> {
        &self.executor
    }

    /// Rebuild keyword tables from the currently active flows
    pub async fn reload_triggers(&self) -> ChatflowResult<LoadReport> {
        let flows = self.executor.flows().active_definitions().await?;
        Ok(self.matcher.load(&flows))
    }

    /// Handle one inbound message; never fails
    pub async fn handle(&self, message: &InboundMessage) -> RouteOutcome {
        // Serialize per sender so two first messages cannot both start a flow
        let _sender = self.senders.lock(&message.sender_key()).await;

        debug!(
            platform = %message.platform,
            user_id = %message.user_id,
            message_id = %message.id,
            "Routing message"
        );

        match self.route(message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    platform = %message.platform,
                    user_id = %message.user_id,
                    "Turn failed: {}",
                    e
                );
                RouteOutcome {
                    conversation_id: None,
                    responses: vec![FlowResponse::message(self.config.fallback_message.clone())],
                    route: Route::Fallback,
                    completed: false,
                }
            }
        }
    }

    async fn route(&self, message: &InboundMessage) -> ChatflowResult<RouteOutcome> {
        let conversations = self.executor.conversations();

        if let Some(active) = conversations
            .get_active_conversation(&message.user_id, &message.platform)
            .await?
        {
            match self.executor.continue_flow(&active.id, &message.text).await {
                Ok(turn) => return Ok(RouteOutcome::from_turn(turn, Route::Continued)),
                Err(e) if e.is_state() || matches!(e, ChatflowError::FlowNotFound(_)) => {
                    error!(
                        conversation_id = %active.id,
                        "Conversation cannot continue, abandoning: {}",
                        e
                    );
                    conversations.mark_abandoned(&active.id).await?;
                }
                Err(e) => return Err(e),
            }
        }

        self.start_fresh(message).await
    }

    async fn start_fresh(&self, message: &InboundMessage) -> ChatflowResult<RouteOutcome> {
        if let Some(hit) = self.matcher.match_text(&message.text) {
            info!(
                flow = %hit.flow_name,
                keyword = %hit.keyword,
                priority = hit.priority,
                "Starting flow from keyword"
            );
            let turn = self
                .executor
                .start_flow(&message.user_id, &message.platform, &hit.flow_name)
                .await?;
            return Ok(RouteOutcome::from_turn(
                turn,
                Route::Keyword {
                    flow: hit.flow_name,
                    priority: hit.priority,
                },
            ));
        }

        if let Some(detector) = &self.intent {
            let flows = self.executor.flows().list_active_flows().await?;
            let intent = detector.detect_intent(&message.text, &flows).await;
            if let Some(flow) = intent.flow_name {
                info!(
                    flow = %flow,
                    confidence = intent.confidence,
                    "Starting flow from intent"
                );
                let turn = self
                    .executor
                    .start_flow(&message.user_id, &message.platform, &flow)
                    .await?;
                return Ok(RouteOutcome::from_turn(
                    turn,
                    Route::Intent {
                        flow,
                        confidence: intent.confidence,
                    },
                ));
            }
            debug!(reasoning = %intent.reasoning, "No intent above threshold");
        }

        debug!(user_id = %message.user_id, "No flow matched");

        Ok(RouteOutcome {
            conversation_id: None,
            responses: self
                .config
                .no_match_message
                .iter()
                .map(|text| FlowResponse::message(text.clone()))
                .collect(),
            route: Route::NoMatch,
            completed: false,
        })
    }
}
