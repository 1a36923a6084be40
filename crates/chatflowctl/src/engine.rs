//! Wires configuration into a running router

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatflow_core::{Conversation, ConversationRepository};
use chatflow_memory::{EventLog, FileConversationStore, FlowCatalog, InMemoryConversationStore};
use chatflow_runtime::FlowExecutor;
use chatflow_triggers::{IntentDetector, MessageRouter};
use tracing::{info, warn};

use crate::config::{ChatflowConfig, StoreConfig};

/// Conversation store selected by configuration
#[derive(Clone)]
pub enum Store {
    Memory(Arc<InMemoryConversationStore>),
    File(Arc<FileConversationStore>),
}

impl Store {
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        match &config.path {
            Some(path) => {
                let store = FileConversationStore::open(path)
                    .await
                    .with_context(|| format!("Failed to open conversation store {}", path.display()))?;
                Ok(Self::File(Arc::new(store)))
            }
            None => Ok(Self::Memory(Arc::new(InMemoryConversationStore::new()))),
        }
    }

    pub fn repository(&self) -> Arc<dyn ConversationRepository> {
        match self {
            Self::Memory(store) => store.clone(),
            Self::File(store) => store.clone(),
        }
    }

    pub async fn snapshot(&self) -> Vec<Conversation> {
        match self {
            Self::Memory(store) => store.snapshot(),
            Self::File(store) => store.snapshot().await,
        }
    }

    pub async fn abandon_idle(&self, max_idle: Duration) -> Result<usize> {
        match self {
            Self::Memory(store) => Ok(store.abandon_idle(max_idle)),
            Self::File(store) => Ok(store.abandon_idle(max_idle).await?),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

/// Everything a transport needs to serve messages
pub struct Engine {
    pub catalog: Arc<FlowCatalog>,
    pub store: Store,
    pub events: EventLog,
    pub router: MessageRouter,
}

impl Engine {
    pub async fn build(config: &ChatflowConfig) -> Result<Self> {
        let spec = &config.spec;

        let catalog = Arc::new(
            FlowCatalog::from_directory(&spec.flows.directory)
                .await
                .with_context(|| format!("Failed to load flows from {}", spec.flows.directory.display()))?,
        );

        let store = Store::open(&spec.store).await?;
        if let Some(mins) = spec.store.idle_timeout_mins {
            let abandoned = store.abandon_idle(Duration::from_secs(mins * 60)).await?;
            if abandoned > 0 {
                info!("Abandoned {} idle conversations", abandoned);
            }
        }

        let events = match &spec.events.path {
            Some(path) => EventLog::file(path)
                .await
                .with_context(|| format!("Failed to open event log {}", path.display()))?,
            None => EventLog::in_memory(),
        };

        let model = chatflow_llm::build_model(&spec.llm)?;

        let executor = FlowExecutor::new(catalog.clone(), store.repository())
            .with_config(config.executor_config())
            .with_model(model.clone())
            .with_event_sink(Arc::new(events.clone()));

        let mut router = MessageRouter::new(Arc::new(executor)).with_config(config.router_config());
        if spec.intent.enabled {
            router = router.with_intent_detector(
                IntentDetector::new(model).with_config(config.intent_config()),
            );
        }

        let report = router.reload_triggers().await?;
        for skipped in &report.skipped {
            warn!("{}", skipped);
        }
        info!(
            flows = catalog.len(),
            triggers = report.registered,
            persistent = store.is_persistent(),
            "Engine ready"
        );

        Ok(Self {
            catalog,
            store,
            events,
            router,
        })
    }

    /// Reload flow files and keyword triggers
    pub async fn reload(&self) -> Result<usize> {
        let count = self.catalog.reload().await?;
        let report = self.router.reload_triggers().await?;
        for skipped in &report.skipped {
            warn!("{}", skipped);
        }
        Ok(count)
    }
}
