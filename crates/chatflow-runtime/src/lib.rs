// Chatflow Runtime - Flow execution engine
//
// Walks conversations through flow definitions: saves answers, resolves
// branches, renders step content (static or model-generated), and runs
// step actions. Storage and the language model are injected through the
// traits in chatflow-core.

pub mod executor;
pub mod locks;

pub use executor::{
    ActionFailure, ActionRunner, ContentGenerator, FlowEvent, FlowExecutor, FlowExecutorConfig,
    TracingEventSink, TracingNotifier,
};
pub use locks::KeyedLocks;
