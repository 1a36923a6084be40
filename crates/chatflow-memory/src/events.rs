//! Analytics event log
//!
//! Collects the events emitted by `track` and `tag` actions. Events are kept
//! in memory and, when a path is configured, appended to a JSON-lines file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chatflow_core::{ChatflowError, ChatflowResult, EventSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

/// One recorded analytics event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub conversation_id: String,
    pub event_type: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Event sink backed by memory and an optional JSON-lines file
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<RwLock<Vec<AnalyticsEvent>>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Ephemeral log
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Log that also appends to `path`, loading events already there
    pub async fn file(path: impl Into<PathBuf>) -> ChatflowResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ChatflowError::storage(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let mut events = Vec::new();
        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                ChatflowError::storage(format!("Failed to read event log {}: {}", path.display(), e))
            })?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let event: AnalyticsEvent = serde_json::from_str(line).map_err(|e| {
                    ChatflowError::storage(format!(
                        "Bad event on line {} of {}: {}",
                        line_no + 1,
                        path.display(),
                        e
                    ))
                })?;
                events.push(event);
            }
        }

        Ok(Self {
            events: Arc::new(RwLock::new(events)),
            path: Some(path),
        })
    }

    /// All recorded events
    pub async fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.read().await.clone()
    }

    /// Events of one type
    pub async fn events_of_type(&self, event_type: &str) -> Vec<AnalyticsEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    async fn append(&self, event: &AnalyticsEvent) -> ChatflowResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ChatflowError::storage(format!("Failed to open {}: {}", path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ChatflowError::storage(format!("Failed to append event: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for EventLog {
    async fn record_event(
        &self,
        conversation_id: &str,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> ChatflowResult<()> {
        let event = AnalyticsEvent {
            conversation_id: conversation_id.to_string(),
            event_type: event_type.to_string(),
            metadata,
            timestamp: Utc::now(),
        };
        self.append(&event).await?;
        debug!(conversation_id, event_type, "Recorded event");
        self.events.write().await.push(event);
        Ok(())
    }
}
