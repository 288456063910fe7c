//! Command handlers for the askbot CLI.

pub mod ask;
pub mod chat;
pub mod history;
pub mod knowledge;
mod setup;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use knowledge::KnowledgeCommand;

/// Conversation used when `--conversation` is not given.
pub const DEFAULT_CONVERSATION: &str = "default";
