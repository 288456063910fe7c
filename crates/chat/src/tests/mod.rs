//! Pipeline and conversation tests against scripted collaborators.

mod pipeline_scenarios;

use crate::generator::{Generator, QueryRewrite, Verdict};
use crate::history::{ConversationHistory, HistoryStore};
use crate::pipeline::AnswerPipeline;
use crate::tokens::TokenCounter;
use askbot_core::{AppError, AppResult};
use askbot_knowledge::{QueryLanguage, RetrievedPassage, Retriever};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counts whitespace-separated words.
pub(crate) struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &str {
        "words"
    }
}

/// Generator replaying queued verdicts and recording what it was given.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    rewrites: Mutex<VecDeque<AppResult<Verdict<QueryRewrite>>>>,
    answers: Mutex<VecDeque<AppResult<Verdict<String>>>>,
    pub contexts: Mutex<Vec<String>>,
    pub history_sizes: Mutex<Vec<usize>>,
    pub answer_delay: Option<Duration>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            answer_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push_rewrite(&self, verdict: AppResult<Verdict<QueryRewrite>>) {
        self.rewrites.lock().unwrap().push_back(verdict);
    }

    pub fn push_answer(&self, verdict: AppResult<Verdict<String>>) {
        self.answers.lock().unwrap().push_back(verdict);
    }

    pub fn answer_calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    async fn rewrite(
        &self,
        question: &str,
        history: &ConversationHistory,
    ) -> AppResult<Verdict<QueryRewrite>> {
        self.history_sizes.lock().unwrap().push(history.len());
        self.rewrites
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Verdict::Accepted(QueryRewrite::passthrough(question))))
    }

    async fn generate_answer(
        &self,
        question: &str,
        _history: &ConversationHistory,
        context: &str,
    ) -> AppResult<Verdict<String>> {
        self.contexts.lock().unwrap().push(context.to_string());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.answer_delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.answers.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(Verdict::Accepted(format!("answer to {}", question))))
    }
}

/// Retriever serving fixed passages per query text.
#[derive(Default)]
pub(crate) struct ScriptedRetriever {
    passages: HashMap<String, Vec<RetrievedPassage>>,
    pub fail: bool,
    pub hang: bool,
    pub calls: Mutex<Vec<(String, QueryLanguage)>>,
}

impl ScriptedRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_passage(mut self, query: &str, source_id: &str, content: &str, score: f32) -> Self {
        self.passages
            .entry(query.to_string())
            .or_default()
            .push(RetrievedPassage {
                source_id: source_id.to_string(),
                content: content.to_string(),
                score,
            });
        self
    }

    pub fn calls(&self) -> Vec<(String, QueryLanguage)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Retriever for ScriptedRetriever {
    async fn search(
        &self,
        query: &str,
        language: QueryLanguage,
    ) -> AppResult<Vec<RetrievedPassage>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), language));

        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(AppError::Knowledge("vector store unreachable".to_string()));
        }
        Ok(self.passages.get(query).cloned().unwrap_or_default())
    }
}

pub(crate) fn pipeline_with(
    generator: Arc<ScriptedGenerator>,
    retriever: Arc<ScriptedRetriever>,
    budget: usize,
) -> AnswerPipeline {
    let store = HistoryStore::new(Arc::new(WordCounter), budget).unwrap();
    AnswerPipeline::new(generator, retriever, store, 0.8)
}

pub(crate) fn rewrite(english: &str, chinese: &str) -> AppResult<Verdict<QueryRewrite>> {
    Ok(Verdict::Accepted(QueryRewrite {
        english_query: english.to_string(),
        chinese_query: chinese.to_string(),
    }))
}
