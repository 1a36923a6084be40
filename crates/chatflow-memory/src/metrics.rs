//! Conversation metrics over a trailing window

use std::collections::HashMap;

use chatflow_core::{Conversation, ConversationStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How often a flow was started in the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCount {
    pub flow: String,
    pub count: usize,
}

/// Summary of conversations started in the last `period_days` days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetrics {
    pub period_days: u32,
    pub total_conversations: usize,
    pub completed_flows: usize,
    /// 0.0 when there are no conversations
    pub completion_rate: f64,
    /// At most five flows, most started first
    pub top_flows: Vec<FlowCount>,
}

const TOP_FLOWS: usize = 5;

/// Start of a trailing window of `period_days` days ending at `now`
///
/// Windows reaching past the representable range start at the earliest
/// representable instant.
pub fn window_start(now: DateTime<Utc>, period_days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(period_days))
        .and_then(|period| now.checked_sub_signed(period))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl ConversationMetrics {
    pub fn compute(conversations: &[Conversation], period_days: u32, now: DateTime<Utc>) -> Self {
        let since = window_start(now, period_days);
        let in_window: Vec<&Conversation> = conversations
            .iter()
            .filter(|c| c.started_at >= since)
            .collect();

        let total = in_window.len();
        let completed = in_window
            .iter()
            .filter(|c| c.status == ConversationStatus::Completed)
            .count();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for conversation in &in_window {
            if let Some(flow) = conversation.current_flow.as_deref() {
                *counts.entry(flow).or_default() += 1;
            }
        }
        let mut top_flows: Vec<FlowCount> = counts
            .into_iter()
            .map(|(flow, count)| FlowCount {
                flow: flow.to_string(),
                count,
            })
            .collect();
        top_flows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.flow.cmp(&b.flow)));
        top_flows.truncate(TOP_FLOWS);

        Self {
            period_days,
            total_conversations: total,
            completed_flows: completed,
            completion_rate: if total > 0 {
                completed as f64 / total as f64
            } else {
                0.0
            },
            top_flows,
        }
    }
}
