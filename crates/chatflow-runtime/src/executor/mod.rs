//! Flow execution
//!
//! - `flow_executor`: the per-conversation state machine
//! - `actions`: side effects attached to steps
//! - `dynamic`: model-personalized step content

pub mod actions;
pub mod dynamic;
pub mod flow_executor;

pub use actions::{ActionFailure, ActionRunner, TracingEventSink, TracingNotifier, TAG_EVENT};
pub use dynamic::{build_prompt, ContentGenerator, DEFAULT_DYNAMIC_INSTRUCTIONS};
pub use flow_executor::{FlowEvent, FlowExecutor, FlowExecutorConfig};
