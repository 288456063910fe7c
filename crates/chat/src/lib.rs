//! Conversational question answering for askbot.
//!
//! A turn flows through [`AnswerPipeline`]: the question is rewritten into
//! English and Chinese search queries (and may be refused), the knowledge
//! base is searched in English with a Chinese fallback, an answer is
//! generated from the relevant passages, and accepted answers are recorded
//! in a token-budgeted [`ConversationHistory`].

pub mod generator;
pub mod history;
pub mod pipeline;
pub mod session;
pub mod tokens;

#[cfg(test)]
mod tests;

pub use generator::{
    parse_answer, parse_rewrite, GenerationSettings, Generator, LlmGenerator, QueryRewrite,
    Verdict,
};
pub use history::{ChatTurn, ConversationHistory, HistoryStore};
pub use pipeline::{escape_for_card, AnswerOutcome, AnswerPipeline};
pub use session::{
    ConversationManager, ConversationStore, FileConversationStore, MemoryConversationStore,
};
pub use tokens::{create_token_counter, TiktokenCounter, TokenCounter};
