//! The answer pipeline: rewrite, retrieve, generate, record.

use crate::generator::{Generator, QueryRewrite, Verdict};
use crate::history::{ChatTurn, ConversationHistory, HistoryStore};
use askbot_core::config::DEFAULT_REFUSAL_MESSAGE;
use askbot_core::{AppError, AppResult};
use askbot_knowledge::{build_reference_context, QueryLanguage, Retriever};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const STAGE_REWRITE: &str = "rewrite";
const STAGE_RETRIEVE: &str = "retrieve";
const STAGE_GENERATE: &str = "generate";

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Accepted answer, escaped for card embedding, recorded in history.
    Answered(String),
    /// Refused question or answer. Never recorded in history.
    Refused(String),
    /// The model produced no text; nothing to show and nothing recorded.
    NoAnswer,
}

impl AnswerOutcome {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, AnswerOutcome::Answered(_))
    }

    /// Text to show the user, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            AnswerOutcome::Answered(text) | AnswerOutcome::Refused(text) => Some(text),
            AnswerOutcome::NoAnswer => None,
        }
    }
}

/// Escape `\` and `"` so the answer can be interpolated into a card template.
///
/// A one-shot boundary transform: applying it twice escapes twice.
pub fn escape_for_card(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Orchestrates one question through generator, retriever and history.
pub struct AnswerPipeline {
    generator: Arc<dyn Generator>,
    retriever: Arc<dyn Retriever>,
    history_store: HistoryStore,
    relevance_threshold: f32,
    refusal_message: String,
}

impl AnswerPipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        retriever: Arc<dyn Retriever>,
        history_store: HistoryStore,
        relevance_threshold: f32,
    ) -> Self {
        Self {
            generator,
            retriever,
            history_store,
            relevance_threshold,
            refusal_message: DEFAULT_REFUSAL_MESSAGE.to_string(),
        }
    }

    pub fn with_refusal_message(mut self, message: impl Into<String>) -> Self {
        self.refusal_message = message.into();
        self
    }

    pub fn history_store(&self) -> &HistoryStore {
        &self.history_store
    }

    /// Answer `question` in the context of `history`.
    ///
    /// `history` is only modified when the answer is accepted and non-empty,
    /// and only after every stage has finished. Generator and retriever
    /// failures surface as [`AppError::Upstream`]; a fired `cancel` token
    /// surfaces as [`AppError::Cancelled`]. Neither touches `history`.
    pub async fn answer(
        &self,
        question: &str,
        history: &mut ConversationHistory,
        cancel: &CancellationToken,
    ) -> AppResult<AnswerOutcome> {
        let snapshot: &ConversationHistory = history;

        let rewrite = match run_stage(
            STAGE_REWRITE,
            cancel,
            self.generator.rewrite(question, snapshot),
        )
        .await?
        {
            Verdict::Accepted(rewrite) => rewrite,
            Verdict::Rejected(reason) => {
                tracing::info!(stage = STAGE_REWRITE, %reason, "Question refused");
                return Ok(AnswerOutcome::Refused(self.refusal_message.clone()));
            }
        };

        tracing::debug!(
            english = %rewrite.english_query,
            chinese = %rewrite.chinese_query,
            "Question rewritten"
        );

        let context = self.reference_context(&rewrite, cancel).await?;

        let verdict = run_stage(
            STAGE_GENERATE,
            cancel,
            self.generator.generate_answer(question, snapshot, &context),
        )
        .await?;

        let (accepted, raw_answer) = match verdict {
            Verdict::Accepted(text) => (true, text),
            Verdict::Rejected(text) => (false, text),
        };

        tracing::info!(answer = %raw_answer, accepted, "Generated answer");

        if raw_answer.trim().is_empty() {
            tracing::warn!(accepted, "Model returned an empty answer");
            return Ok(AnswerOutcome::NoAnswer);
        }

        let answer = escape_for_card(&raw_answer);

        if !accepted {
            tracing::info!(stage = STAGE_GENERATE, "Answer refused");
            return Ok(AnswerOutcome::Refused(answer));
        }

        if cancel.is_cancelled() {
            return Err(AppError::cancelled(STAGE_GENERATE));
        }

        let evicted = self
            .history_store
            .record(history, ChatTurn::new(question, answer.clone()));
        tracing::debug!(
            turns = history.len(),
            evicted,
            tokens = self.history_store.token_count(history),
            "Recorded turn"
        );

        Ok(AnswerOutcome::Answered(answer))
    }

    /// English search first; the Chinese query only runs when nothing
    /// relevant came back.
    async fn reference_context(
        &self,
        rewrite: &QueryRewrite,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        let attempts = [
            (&rewrite.english_query, QueryLanguage::English),
            (&rewrite.chinese_query, QueryLanguage::Chinese),
        ];

        for (query, language) in attempts {
            let passages = run_stage(
                STAGE_RETRIEVE,
                cancel,
                self.retriever.search(query, language),
            )
            .await?;

            let context = build_reference_context(&passages, self.relevance_threshold);
            tracing::debug!(
                language = %language,
                retrieved = passages.len(),
                relevant = passages
                    .iter()
                    .filter(|p| p.score > self.relevance_threshold)
                    .count(),
                "Retrieval attempt"
            );

            if !context.is_empty() {
                return Ok(context);
            }
        }

        Ok(String::new())
    }
}

/// Await a stage, racing it against cancellation and tagging its errors.
async fn run_stage<T>(
    stage: &'static str,
    cancel: &CancellationToken,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::cancelled(stage)),
        result = fut => result.map_err(|e| match e {
            AppError::Cancelled { .. } | AppError::Upstream { .. } => e,
            other => {
                tracing::warn!(stage, error = %other, "Pipeline stage failed");
                AppError::upstream(stage, other.to_string())
            }
        }),
    }
}
