//! Routing dry-run: which flow would this text start?

use anyhow::{Context, Result};
use chatflow_core::FlowRepository;
use chatflow_memory::FlowCatalog;
use chatflow_triggers::{IntentDetector, KeywordMatcher};
use serde_json::json;
use tracing::warn;

use crate::config::ChatflowConfig;

pub async fn execute(config: &ChatflowConfig, text: &str, use_intent: bool, output: &str) -> Result<()> {
    let dir = &config.spec.flows.directory;
    let catalog = FlowCatalog::from_directory(dir)
        .await
        .with_context(|| format!("Failed to load flows from {}", dir.display()))?;

    let matcher = KeywordMatcher::new();
    let report = matcher.load(&catalog.active_definitions().await?);
    for skipped in &report.skipped {
        warn!("{}", skipped);
    }

    let keyword = matcher.match_text(text);

    let intent = if keyword.is_none() && use_intent {
        let model = chatflow_llm::build_model(&config.spec.llm)?;
        let detector = IntentDetector::new(model).with_config(config.intent_config());
        let flows = catalog.list_active_flows().await?;
        Some(detector.detect_intent(text, &flows).await)
    } else {
        None
    };

    let result = json!({
        "text": text,
        "keyword": keyword.as_ref().map(|m| json!({
            "flow": m.flow_name,
            "keyword": m.keyword,
            "matchType": m.match_type,
            "priority": m.priority,
        })),
        "intent": intent,
    });

    match output {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "yaml" => println!("{}", serde_yaml::to_string(&result)?),
        _ => match (&keyword, &intent) {
            (Some(m), _) => println!(
                "{}  (keyword \"{}\", {:?}, priority {})",
                m.flow_name, m.keyword, m.match_type, m.priority
            ),
            (None, Some(i)) => match &i.flow_name {
                Some(flow) => println!(
                    "{}  (intent, confidence {:.2}: {})",
                    flow, i.confidence, i.reasoning
                ),
                None => println!(
                    "no match  (intent confidence {:.2}: {})",
                    i.confidence, i.reasoning
                ),
            },
            (None, None) => println!("no match"),
        },
    }

    Ok(())
}
