//! Chatflow Memory - Storage backends for flows, conversations and analytics
//!
//! ## Backends
//!
//! - **FlowCatalog**: flow definitions loaded from a YAML directory
//! - **InMemoryConversationStore**: fast, ephemeral conversations cleared on restart
//! - **FileConversationStore**: JSON file storage that survives restarts
//! - **EventLog**: analytics events, optionally appended to a JSON-lines file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chatflow_memory::{FileConversationStore, FlowCatalog};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let flows = FlowCatalog::from_directory("./flows").await?;
//! let conversations = FileConversationStore::open("./data/conversations.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod events;
pub mod flows;
pub mod metrics;

pub use backend::file::FileConversationStore;
pub use backend::memory::InMemoryConversationStore;
pub use events::{AnalyticsEvent, EventLog};
pub use flows::FlowCatalog;
pub use metrics::{window_start, ConversationMetrics, FlowCount};
