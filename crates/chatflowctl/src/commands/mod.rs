pub mod chat;
pub mod completion;
pub mod matching;
pub mod metrics;
pub mod validate;
