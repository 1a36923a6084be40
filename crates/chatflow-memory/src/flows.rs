//! FlowCatalog - Loads and serves flow definitions
//!
//! The FlowCatalog provides:
//! - Loading flows from YAML files in a directory
//! - Programmatic registration (seeding, tests)
//! - Whole-catalog reload that swaps in a fresh snapshot
//! - The `FlowRepository` view the engine consumes (active flows only)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chatflow_core::{ChatflowError, ChatflowResult, FlowDefinition, FlowRepository, FlowSummary};
use tracing::{debug, info, warn};

/// FlowCatalog manages flow definitions in registration order
pub struct FlowCatalog {
    /// Current snapshot; replaced wholesale on every change
    flows: ArcSwap<Vec<Arc<FlowDefinition>>>,

    /// Flows directory (for reloading)
    flows_dir: Option<PathBuf>,
}

impl FlowCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            flows: ArcSwap::from_pointee(Vec::new()),
            flows_dir: None,
        }
    }

    /// Create a catalog from already-built definitions
    pub fn with_flows(flows: impl IntoIterator<Item = FlowDefinition>) -> Self {
        let catalog = Self::new();
        for flow in flows {
            catalog.register(flow);
        }
        catalog
    }

    /// Create catalog and load flows from a directory
    pub async fn from_directory(dir: impl AsRef<Path>) -> ChatflowResult<Self> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();
        catalog.flows_dir = Some(dir.to_path_buf());
        let flows = Self::read_directory(dir).await?;
        catalog.flows.store(Arc::new(flows));
        Ok(catalog)
    }

    /// Read every `.yaml`/`.yml` flow in a directory, sorted by file name.
    /// Files that fail to parse or validate are logged and skipped.
    async fn read_directory(dir: &Path) -> ChatflowResult<Vec<Arc<FlowDefinition>>> {
        if !dir.exists() {
            return Err(ChatflowError::config(format!(
                "Flows directory does not exist: {}",
                dir.display()
            )));
        }

        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            ChatflowError::config(format!("Failed to read flows directory: {}", e))
        })?;

        let mut paths = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if ext == "yaml" || ext == "yml" {
                    paths.push(path);
                }
            }
        }
        paths.sort();

        let mut flows: Vec<Arc<FlowDefinition>> = Vec::new();
        for path in paths {
            match Self::read_file(&path).await {
                Ok(flow) => {
                    info!("Loaded flow: {} from {}", flow.name, path.display());
                    flows.retain(|f| f.name != flow.name);
                    flows.push(Arc::new(flow));
                }
                Err(e) => {
                    warn!("Failed to load flow from {}: {}", path.display(), e);
                }
            }
        }

        info!("Loaded {} flows from {}", flows.len(), dir.display());
        Ok(flows)
    }

    /// Parse and validate a single flow file
    pub async fn read_file(path: impl AsRef<Path>) -> ChatflowResult<FlowDefinition> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ChatflowError::config(format!("Failed to read flow file {}: {}", path.display(), e))
        })?;

        let flow = FlowDefinition::from_yaml_str(&content)?;
        for warning in flow.validate()? {
            warn!("Flow '{}' ({}): {}", flow.name, path.display(), warning);
        }
        Ok(flow)
    }

    /// Register a flow directly, replacing any flow with the same name
    pub fn register(&self, flow: FlowDefinition) -> String {
        let name = flow.name.clone();
        let flow = Arc::new(flow);
        self.flows.rcu(|current| {
            let mut next: Vec<Arc<FlowDefinition>> = current
                .iter()
                .filter(|f| f.name != name)
                .cloned()
                .collect();
            next.push(flow.clone());
            next
        });
        debug!("Registered flow: {}", name);
        name
    }

    /// Get a flow by name, active or not
    pub fn get(&self, name: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.load().iter().find(|f| f.name == name).cloned()
    }

    /// Remove a flow
    pub fn remove(&self, name: &str) -> Option<Arc<FlowDefinition>> {
        let removed = self.get(name)?;
        self.flows.rcu(|current| {
            current
                .iter()
                .filter(|f| f.name != name)
                .cloned()
                .collect::<Vec<_>>()
        });
        Some(removed)
    }

    /// List all flow names
    pub fn list(&self) -> Vec<String> {
        self.flows.load().iter().map(|f| f.name.clone()).collect()
    }

    /// Get all flows, including inactive ones
    pub fn all(&self) -> Vec<Arc<FlowDefinition>> {
        self.flows.load().iter().cloned().collect()
    }

    /// Number of registered flows
    pub fn len(&self) -> usize {
        self.flows.load().len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.flows.load().is_empty()
    }

    /// Reload all flows from the configured directory.
    ///
    /// The new set is built completely before it replaces the old one, so
    /// readers never observe a half-loaded catalog.
    pub async fn reload(&self) -> ChatflowResult<usize> {
        let dir = self
            .flows_dir
            .as_ref()
            .ok_or_else(|| ChatflowError::config("No flows directory configured"))?;
        let flows = Self::read_directory(dir).await?;
        let count = flows.len();
        self.flows.store(Arc::new(flows));
        Ok(count)
    }
}

impl Default for FlowCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowRepository for FlowCatalog {
    async fn get_flow_by_name(&self, name: &str) -> ChatflowResult<Option<Arc<FlowDefinition>>> {
        Ok(self.get(name).filter(|f| f.is_active))
    }

    async fn list_active_flows(&self) -> ChatflowResult<Vec<FlowSummary>> {
        Ok(self
            .flows
            .load()
            .iter()
            .filter(|f| f.is_active)
            .map(|f| f.summary())
            .collect())
    }

    async fn active_definitions(&self) -> ChatflowResult<Vec<Arc<FlowDefinition>>> {
        Ok(self
            .flows
            .load()
            .iter()
            .filter(|f| f.is_active)
            .cloned()
            .collect())
    }
}
