// Chatflow Triggers - From inbound text to a flow turn
//
// Keyword matching, language-model intent detection, and the message
// router that decides whether a message continues a conversation or
// starts a new flow.

pub mod intent;
pub mod keyword;
pub mod message;
pub mod router;

pub use intent::{IntentDetector, IntentDetectorConfig, IntentResult};
pub use keyword::{KeywordMatch, KeywordMatcher, LoadReport};
pub use message::InboundMessage;
pub use router::{MessageRouter, Route, RouteOutcome, RouterConfig};
