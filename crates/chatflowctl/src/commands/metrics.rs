//! Conversation and analytics metrics

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chatflow_memory::{window_start, ConversationMetrics, EventLog};
use chrono::Utc;
use serde_json::json;

use crate::config::ChatflowConfig;
use crate::engine::Store;

pub async fn execute(config: &ChatflowConfig, days: u32, output: &str) -> Result<()> {
    if config.spec.store.path.is_none() {
        anyhow::bail!("Metrics need a persisted conversation store; set spec.store.path or pass --store");
    }

    let store = Store::open(&config.spec.store).await?;
    let now = Utc::now();
    let metrics = ConversationMetrics::compute(&store.snapshot().await, days, now);

    let since = window_start(now, days);
    let mut event_counts: BTreeMap<String, usize> = BTreeMap::new();
    if let Some(path) = &config.spec.events.path {
        let log = EventLog::file(path)
            .await
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        for event in log.events().await.into_iter().filter(|e| e.timestamp >= since) {
            *event_counts.entry(event.event_type).or_default() += 1;
        }
    }

    match output {
        "json" | "yaml" => {
            let report = json!({
                "conversations": metrics,
                "events": event_counts,
            });
            if output == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", serde_yaml::to_string(&report)?);
            }
        }
        _ => {
            println!("Last {} days", metrics.period_days);
            println!("  Conversations:   {}", metrics.total_conversations);
            println!("  Completed:       {}", metrics.completed_flows);
            println!("  Completion rate: {:.1}%", metrics.completion_rate * 100.0);
            if !metrics.top_flows.is_empty() {
                println!("\nTop flows");
                for entry in &metrics.top_flows {
                    println!("  {:<24} {}", entry.flow, entry.count);
                }
            }
            if !event_counts.is_empty() {
                println!("\nEvents");
                for (event, count) in &event_counts {
                    println!("  {:<24} {}", event, count);
                }
            }
        }
    }

    Ok(())
}
