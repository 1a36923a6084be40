//! Integration tests for message routing

use std::sync::Arc;

use async_trait::async_trait;
use chatflow_core::{
    ChatflowError, ChatflowResult, Conversation, ConversationContext, ConversationRepository,
    ConversationStatus, FlowDefinition, FlowRepository, FlowResponse, LanguageModel,
};
use chatflow_memory::{FlowCatalog, InMemoryConversationStore};
use chatflow_runtime::FlowExecutor;
use chatflow_triggers::{
    InboundMessage, IntentDetector, MessageRouter, Route, RouterConfig,
};

const PRICING: &str = r#"
name: pricing_inquiry
description: Questions about plans, prices and cost
triggerKeywords:
  - keyword: pricing
    priority: 10
  - keyword: cost
    matchType: contains
    priority: 8
steps:
  - id: ask_name
    type: question
    content: "Happy to help with pricing! What's your name?"
    saveAs: name
    next: done
  - id: done
    type: end
    content: "Thanks, a specialist will reach out."
"#;

const DEMO: &str = r#"
name: demo_request
description: Book a product demo
triggerKeywords:
  - keyword: demo
    matchType: contains
    priority: 10
steps:
  - id: confirm
    type: end
    content: "Demo booked!"
"#;

const SUPPORT: &str = r#"
name: support
description: Help with login problems and broken accounts
steps:
  - id: ask_issue
    type: question
    content: "What went wrong?"
    saveAs: issue
"#;

fn flows() -> Vec<FlowDefinition> {
    [PRICING, DEMO, SUPPORT]
        .iter()
        .map(|y| FlowDefinition::from_yaml_str(y).unwrap())
        .collect()
}

struct Harness {
    router: MessageRouter,
    store: Arc<InMemoryConversationStore>,
    catalog: Arc<FlowCatalog>,
}

async fn harness() -> Harness {
    let catalog = Arc::new(FlowCatalog::with_flows(flows()));
    let store = Arc::new(InMemoryConversationStore::new());
    let executor = Arc::new(FlowExecutor::new(catalog.clone(), store.clone()));
    let router = MessageRouter::new(executor);
    router.reload_triggers().await.unwrap();
    Harness {
        router,
        store,
        catalog,
    }
}

fn msg(text: &str) -> InboundMessage {
    InboundMessage::new("telegram", "u1", text)
}

fn first_text(responses: &[FlowResponse]) -> &str {
    responses.iter().find_map(|r| r.as_text()).unwrap()
}

#[tokio::test]
async fn test_keyword_starts_then_conversation_continues() {
    let h = harness().await;

    let outcome = h.router.handle(&msg("what's the cost?")).await;
    assert_eq!(
        outcome.route,
        Route::Keyword {
            flow: "pricing_inquiry".into(),
            priority: 8
        }
    );
    assert_eq!(
        first_text(&outcome.responses),
        "Happy to help with pricing! What's your name?"
    );
    let id = outcome.conversation_id.unwrap();

    // Mentions "demo" but is an answer to the open question
    let outcome = h.router.handle(&msg("Demo Dan")).await;
    assert_eq!(outcome.route, Route::Continued);
    assert_eq!(outcome.conversation_id.as_deref(), Some(id.as_str()));
    assert!(outcome.completed);

    let conversation = h.store.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(conversation.context.get_str("name"), Some("Demo Dan"));
    assert_eq!(conversation.status, ConversationStatus::Completed);
}

#[tokio::test]
async fn test_exact_demo_prefers_matching_keyword() {
    let h = harness().await;
    let outcome = h.router.handle(&msg("demo")).await;
    assert_eq!(
        outcome.route,
        Route::Keyword {
            flow: "demo_request".into(),
            priority: 10
        }
    );
    assert!(outcome.completed);
}

#[tokio::test]
async fn test_no_match_is_silent_by_default() {
    let h = harness().await;
    let outcome = h.router.handle(&msg("hello there")).await;

    assert_eq!(outcome.route, Route::NoMatch);
    assert!(outcome.responses.is_empty());
    assert!(outcome.conversation_id.is_none());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_no_match_message() {
    let catalog = Arc::new(FlowCatalog::with_flows(flows()));
    let store = Arc::new(InMemoryConversationStore::new());
    let router = MessageRouter::new(Arc::new(FlowExecutor::new(catalog, store))).with_config(
        RouterConfig {
            no_match_message: Some("Try asking about pricing or a demo.".into()),
            ..Default::default()
        },
    );
    router.reload_triggers().await.unwrap();

    let outcome = router.handle(&msg("hello")).await;
    assert_eq!(outcome.route, Route::NoMatch);
    assert_eq!(
        outcome.responses,
        vec![FlowResponse::message("Try asking about pricing or a demo.")]
    );
}

struct ClassifierModel;

#[async_trait]
impl LanguageModel for ClassifierModel {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> ChatflowResult<String> {
        if prompt.contains("can't log in") {
            Ok(r#"{"flowName": "support", "confidence": 0.88, "reasoning": "login problem"}"#.into())
        } else {
            Ok(r#"{"flowName": "support", "confidence": 0.2, "reasoning": "unclear"}"#.into())
        }
    }
}

#[tokio::test]
async fn test_intent_fallback_starts_flow() {
    let h = harness().await;
    let router = MessageRouter::new(h.router.executor().clone())
        .with_intent_detector(IntentDetector::new(Arc::new(ClassifierModel)));
    router.reload_triggers().await.unwrap();

    let outcome = router.handle(&msg("I can't log in")).await;
    assert_eq!(
        outcome.route,
        Route::Intent {
            flow: "support".into(),
            confidence: 0.88
        }
    );
    assert_eq!(first_text(&outcome.responses), "What went wrong?");

    let outcome = router.handle(&InboundMessage::new("telegram", "u2", "weather?")).await;
    assert_eq!(outcome.route, Route::NoMatch);
}

#[tokio::test]
async fn test_stale_conversation_is_abandoned_and_restarted() {
    let h = harness().await;
    let old_id = h
        .router
        .handle(&msg("pricing"))
        .await
        .conversation_id
        .unwrap();

    let mut ctx = ConversationContext::new();
    ctx.current_step_id = Some("step_deleted_in_edit".into());
    h.store.update_context(&old_id, &ctx).await.unwrap();

    let outcome = h.router.handle(&msg("book a demo")).await;
    assert_eq!(
        outcome.route,
        Route::Keyword {
            flow: "demo_request".into(),
            priority: 10
        }
    );
    assert_ne!(outcome.conversation_id.as_deref(), Some(old_id.as_str()));

    let old = h.store.get_by_id(&old_id).await.unwrap().unwrap();
    assert_eq!(old.status, ConversationStatus::Abandoned);
}

#[tokio::test]
async fn test_removed_flow_abandons_conversation() {
    let h = harness().await;
    let old_id = h.router.handle(&msg("pricing")).await.conversation_id.unwrap();

    h.catalog.remove("pricing_inquiry");
    let outcome = h.router.handle(&msg("Ada")).await;

    assert_eq!(outcome.route, Route::NoMatch);
    let old = h.store.get_by_id(&old_id).await.unwrap().unwrap();
    assert_eq!(old.status, ConversationStatus::Abandoned);
}

/// Store whose writes always fail
struct BrokenStore;

#[async_trait]
impl ConversationRepository for BrokenStore {
    async fn get_active_conversation(&self, _: &str, _: &str) -> ChatflowResult<Option<Conversation>> {
        Ok(None)
    }

    async fn create(&self, _: &str, _: &str, _: &str) -> ChatflowResult<String> {
        Err(ChatflowError::storage("disk full at /var/lib/chatflow"))
    }

    async fn get_by_id(&self, _: &str) -> ChatflowResult<Option<Conversation>> {
        Ok(None)
    }

    async fn update_context(&self, _: &str, _: &ConversationContext) -> ChatflowResult<()> {
        Err(ChatflowError::storage("disk full"))
    }

    async fn mark_completed(&self, _: &str) -> ChatflowResult<()> {
        Err(ChatflowError::storage("disk full"))
    }

    async fn mark_abandoned(&self, _: &str) -> ChatflowResult<()> {
        Err(ChatflowError::storage("disk full"))
    }
}

#[tokio::test]
async fn test_engine_failure_becomes_fallback_message() {
    let catalog = Arc::new(FlowCatalog::with_flows(flows()));
    let router = MessageRouter::new(Arc::new(FlowExecutor::new(catalog, Arc::new(BrokenStore))));
    router.reload_triggers().await.unwrap();

    let outcome = router.handle(&msg("pricing")).await;
    assert_eq!(outcome.route, Route::Fallback);
    assert_eq!(outcome.responses.len(), 1);

    let text = first_text(&outcome.responses);
    assert_eq!(text, RouterConfig::default().fallback_message);
    assert!(!text.contains("disk full"));
}

#[tokio::test]
async fn test_simultaneous_first_messages_start_one_conversation() {
    let h = Arc::new(harness().await);

    let outcomes = futures::future::join_all((0..2).map(|_| {
        let h = h.clone();
        tokio::spawn(async move { h.router.handle(&msg("pricing")).await })
    }))
    .await;

    let routes: Vec<Route> = outcomes.into_iter().map(|o| o.unwrap().route).collect();
    assert!(routes.contains(&Route::Continued));
    assert!(routes.iter().any(|r| matches!(r, Route::Keyword { .. })));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_reload_picks_up_new_flows() {
    let h = harness().await;
    assert_eq!(h.router.handle(&msg("refund")).await.route, Route::NoMatch);

    h.catalog.register(
        FlowDefinition::from_yaml_str(
            r#"
name: refunds
triggerKeywords:
  - keyword: refund
steps:
  - id: ok
    type: end
    content: "Refund started."
"#,
        )
        .unwrap(),
    );
    let report = h.router.reload_triggers().await.unwrap();
    assert!(report.skipped.is_empty());

    let outcome = h.router.handle(&msg("refund")).await;
    assert!(matches!(outcome.route, Route::Keyword { ref flow, .. } if flow == "refunds"));
}

#[tokio::test]
async fn test_inactive_flow_keywords_are_not_loaded() {
    let mut demo = FlowDefinition::from_yaml_str(DEMO).unwrap();
    demo.is_active = false;
    let catalog = Arc::new(FlowCatalog::with_flows(vec![demo]));
    let store = Arc::new(InMemoryConversationStore::new());
    let router = MessageRouter::new(Arc::new(FlowExecutor::new(catalog, store)));
    router.reload_triggers().await.unwrap();

    assert!(router.matcher().is_empty());
    assert_eq!(router.handle(&msg("demo")).await.route, Route::NoMatch);
}

#[tokio::test]
async fn test_catalog_is_flow_repository() {
    let h = harness().await;
    let listed = h.catalog.list_active_flows().await.unwrap();
    assert_eq!(listed.len(), 3);
}
