//! Conversation history and token-budget enforcement.

use crate::tokens::TokenCounter;
use askbot_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

impl ChatTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Ordered turns of one conversation, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: VecDeque<ChatTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The text whose token count is budgeted: `user\nassistant` per turn,
    /// turns joined by `\n`.
    pub fn serialized(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}\n{}", t.user, t.assistant))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&mut self, turn: ChatTurn) {
        self.turns.push_back(turn);
    }

    fn pop_oldest(&mut self) -> Option<ChatTurn> {
        self.turns.pop_front()
    }
}

impl FromIterator<ChatTurn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = ChatTurn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// Appends turns and keeps a history within its token budget.
///
/// Eviction is strict FIFO: while the serialized history is over budget the
/// oldest turn is dropped. After [`HistoryStore::enforce_budget`] the history
/// is within budget or empty.
#[derive(Clone)]
pub struct HistoryStore {
    counter: Arc<dyn TokenCounter>,
    token_budget: usize,
}

impl HistoryStore {
    pub fn new(counter: Arc<dyn TokenCounter>, token_budget: usize) -> AppResult<Self> {
        if token_budget == 0 {
            return Err(AppError::Config(
                "History token budget must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            counter,
            token_budget,
        })
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn token_count(&self, history: &ConversationHistory) -> usize {
        self.counter.count(&history.serialized())
    }

    pub fn append(&self, history: &mut ConversationHistory, turn: ChatTurn) {
        history.push(turn);
    }

    /// Drop the oldest turns until the history fits. Returns how many were dropped.
    pub fn enforce_budget(&self, history: &mut ConversationHistory) -> usize {
        let mut evicted = 0;
        let mut tokens = self.token_count(history);

        while tokens > self.token_budget && history.pop_oldest().is_some() {
            evicted += 1;
            tokens = self.token_count(history);
        }

        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining_turns = history.len(),
                tokens,
                budget = self.token_budget,
                counter = self.counter.name(),
                "Trimmed conversation history"
            );
        }

        evicted
    }

    /// Append a turn and immediately enforce the budget.
    pub fn record(&self, history: &mut ConversationHistory, turn: ChatTurn) -> usize {
        self.append(history, turn);
        self.enforce_budget(history)
    }
}
