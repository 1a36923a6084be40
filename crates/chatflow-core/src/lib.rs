// Chatflow Core - Foundation types and traits for the chatflow engine
//
// Flow definitions, conversation records, response entries, and the
// collaborator traits (storage, language model, event sinks) that the
// runtime and trigger crates are written against.

pub mod conversation;
pub mod error;
pub mod events;
pub mod flow;
pub mod model;
pub mod repository;
pub mod response;

pub use conversation::{
    latest_active, Conversation, ConversationContext, ConversationStatus, CURRENT_STEP_KEY,
};
pub use error::{ChatflowError, ChatflowResult};
pub use events::{EventSink, Notifier};
pub use flow::{
    Action, ButtonOption, FlowDefinition, FlowSummary, InputType, MatchType, Step, StepKind,
    TriggerKeyword,
};
pub use model::{DisabledModel, LanguageModel};
pub use repository::{ConversationRepository, FlowRepository};
pub use response::{ButtonChoice, FlowResponse, TurnResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
