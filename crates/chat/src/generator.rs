//! Language-model calls for the rewrite and answer stages.
//!
//! Content-policy decisions come back as [`Verdict::Rejected`], never as an
//! error. Errors are reserved for transport, quota and prompt failures.

use crate::history::ConversationHistory;
use askbot_core::{AppResult, ChatConfig};
use askbot_llm::{LlmClient, LlmRequest};
use askbot_prompt::{
    build_prompt, load_prompt, BuiltPrompt, PromptDefinition, ANSWER_PROMPT_ID, REWRITE_PROMPT_ID,
};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Outcome of a policy-checked model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T> {
    Accepted(T),
    /// The model judged the request unacceptable; carries the model's text.
    Rejected(String),
}

impl<T> Verdict<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// A follow-up question resolved into standalone queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRewrite {
    pub english_query: String,
    pub chinese_query: String,
}

impl QueryRewrite {
    /// Both languages set to the unmodified question.
    pub fn passthrough(question: &str) -> Self {
        Self {
            english_query: question.to_string(),
            chinese_query: question.to_string(),
        }
    }
}

/// The two model operations the answer pipeline depends on.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Judge the question and rewrite it into standalone English and Chinese queries.
    async fn rewrite(
        &self,
        question: &str,
        history: &ConversationHistory,
    ) -> AppResult<Verdict<QueryRewrite>>;

    /// Answer the question from the reference context and history.
    async fn generate_answer(
        &self,
        question: &str,
        history: &ConversationHistory,
        context: &str,
    ) -> AppResult<Verdict<String>>;
}

/// Sampling settings for the two stages.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub rewrite_temperature: f32,
    pub answer_temperature: f32,
    pub max_answer_tokens: u32,
}

impl From<&ChatConfig> for GenerationSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            rewrite_temperature: config.rewrite_temperature,
            answer_temperature: config.answer_temperature,
            max_answer_tokens: config.max_answer_tokens,
        }
    }
}

/// [`Generator`] backed by an [`LlmClient`] and the `chat.*` prompts.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    rewrite_prompt: PromptDefinition,
    answer_prompt: PromptDefinition,
    settings: GenerationSettings,
}

impl LlmGenerator {
    /// Load the rewrite and answer prompts (workspace overrides first).
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        workspace: &Path,
        settings: GenerationSettings,
    ) -> AppResult<Self> {
        let rewrite_prompt = load_prompt(workspace, REWRITE_PROMPT_ID)?;
        let answer_prompt = load_prompt(workspace, ANSWER_PROMPT_ID)?;
        Ok(Self::with_prompts(
            client,
            model,
            rewrite_prompt,
            answer_prompt,
            settings,
        ))
    }

    pub fn with_prompts(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        rewrite_prompt: PromptDefinition,
        answer_prompt: PromptDefinition,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            rewrite_prompt,
            answer_prompt,
            settings,
        }
    }

    async fn complete(
        &self,
        built: BuiltPrompt,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> AppResult<String> {
        let mut request =
            LlmRequest::new(built.user, self.model.as_str()).with_temperature(temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if built.metadata.json_output {
            request = request.with_json_output();
        }
        if let Some(max_tokens) = max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.client.complete(&request).await?;
        tracing::debug!(
            prompt = %built.metadata.source_prompt_id,
            provider = self.client.provider_name(),
            tokens = response.usage.total_tokens,
            "Model call complete"
        );

        Ok(response.content)
    }
}

#[async_trait::async_trait]
impl Generator for LlmGenerator {
    async fn rewrite(
        &self,
        question: &str,
        history: &ConversationHistory,
    ) -> AppResult<Verdict<QueryRewrite>> {
        let vars = json!({ "question": question, "history": history });
        let built = build_prompt(&self.rewrite_prompt, &vars)?;
        let raw = self
            .complete(built, self.settings.rewrite_temperature, None)
            .await?;
        Ok(parse_rewrite(question, &raw))
    }

    async fn generate_answer(
        &self,
        question: &str,
        history: &ConversationHistory,
        context: &str,
    ) -> AppResult<Verdict<String>> {
        let vars = json!({ "question": question, "history": history, "context": context });
        let built = build_prompt(&self.answer_prompt, &vars)?;
        let raw = self
            .complete(
                built,
                self.settings.answer_temperature,
                Some(self.settings.max_answer_tokens),
            )
            .await?;
        Ok(parse_answer(&raw))
    }
}

/// Interpret the rewrite model's reply.
///
/// Blank or missing queries fall back to the original question. A reply
/// that is not a JSON object is treated as acceptable with both queries
/// set to the question.
pub fn parse_rewrite(question: &str, raw: &str) -> Verdict<QueryRewrite> {
    let Some(reply) = extract_json_object(raw) else {
        tracing::warn!("Rewrite reply was not a JSON object; using the original question");
        return Verdict::Accepted(QueryRewrite::passthrough(question));
    };

    if !acceptability_flag(&reply) {
        return Verdict::Rejected("question flagged by the rewrite stage".to_string());
    }

    let query = |key: &str| {
        reply
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(question)
            .to_string()
    };

    Verdict::Accepted(QueryRewrite {
        english_query: query("englishQuery"),
        chinese_query: query("chineseQuery"),
    })
}

/// Interpret the answer model's reply. Plain text counts as an accepted answer.
pub fn parse_answer(raw: &str) -> Verdict<String> {
    let Some(reply) = extract_json_object(raw) else {
        return Verdict::Accepted(raw.trim().to_string());
    };

    let answer = reply
        .get("answer")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    if acceptability_flag(&reply) {
        Verdict::Accepted(answer)
    } else {
        Verdict::Rejected(answer)
    }
}

/// `isAcceptable` as a boolean; absent means acceptable.
fn acceptability_flag(reply: &Map<String, Value>) -> bool {
    match reply.get("isAcceptable") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "false" | "no" | "0"
        ),
        _ => true,
    }
}

/// Pull a JSON object out of a reply that may be fenced or wrapped in prose.
fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ChatTurn;
    use askbot_llm::LlmResponse;
    use askbot_llm::LlmUsage;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replies with a fixed string and records every request.
    struct ScriptedClient {
        reply: String,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(LlmResponse {
                content: self.reply.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
                done: true,
            })
        }
    }

    fn generator(client: Arc<ScriptedClient>, workspace: &Path) -> LlmGenerator {
        LlmGenerator::new(
            client,
            "test-model",
            workspace,
            GenerationSettings::from(&ChatConfig::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_rewrite_accepted() {
        let raw = r#"{"isAcceptable": true, "englishQuery": "What is the capital of France?", "chineseQuery": "法国的首都是哪里？"}"#;
        assert_eq!(
            parse_rewrite("capital?", raw),
            Verdict::Accepted(QueryRewrite {
                english_query: "What is the capital of France?".to_string(),
                chinese_query: "法国的首都是哪里？".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_rewrite_rejected() {
        let raw = r#"{"isAcceptable": false, "englishQuery": "", "chineseQuery": ""}"#;
        assert!(!parse_rewrite("how to pick a lock", raw).is_accepted());

        let stringly = r#"{"isAcceptable": "false"}"#;
        assert!(!parse_rewrite("q", stringly).is_accepted());
    }

    #[test]
    fn test_parse_rewrite_blank_query_falls_back() {
        let raw = "```json\n{\"isAcceptable\": true, \"englishQuery\": \"  \"}\n```";
        assert_eq!(
            parse_rewrite("original", raw),
            Verdict::Accepted(QueryRewrite::passthrough("original"))
        );
    }

    #[test]
    fn test_parse_rewrite_not_json() {
        assert_eq!(
            parse_rewrite("original", "I think you mean Paris"),
            Verdict::Accepted(QueryRewrite::passthrough("original"))
        );
    }

    #[test]
    fn test_parse_answer_variants() {
        assert_eq!(
            parse_answer(r#"{"isAcceptable": true, "answer": " Paris. "}"#),
            Verdict::Accepted("Paris.".to_string())
        );
        assert_eq!(
            parse_answer(r#"{"isAcceptable": false, "answer": "I can't help with that."}"#),
            Verdict::Rejected("I can't help with that.".to_string())
        );
        assert_eq!(
            parse_answer("Paris is the capital."),
            Verdict::Accepted("Paris is the capital.".to_string())
        );
        assert_eq!(
            parse_answer(r#"{"isAcceptable": true}"#),
            Verdict::Accepted(String::new())
        );
    }

    #[tokio::test]
    async fn test_rewrite_request_shape() {
        let temp = TempDir::new().unwrap();
        let client = ScriptedClient::new(
            r#"{"isAcceptable": true, "englishQuery": "Is Rust fast?", "chineseQuery": "Rust 快吗？"}"#,
        );
        let generator = generator(client.clone(), temp.path());

        let history: ConversationHistory =
            std::iter::once(ChatTurn::new("Tell me about Rust", "Rust is a language.")).collect();
        let verdict = generator.rewrite("Is it fast?", &history).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Accepted(QueryRewrite {
                english_query: "Is Rust fast?".to_string(),
                chinese_query: "Rust 快吗？".to_string(),
            })
        );

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!(request.json_output);
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.model, "test-model");
        assert!(request.prompt.contains("User: Tell me about Rust"));
        assert!(request.prompt.contains("Is it fast?"));
    }

    #[tokio::test]
    async fn test_answer_request_includes_context() {
        let temp = TempDir::new().unwrap();
        let client = ScriptedClient::new(r#"{"isAcceptable": true, "answer": "Paris."}"#);
        let generator = generator(client.clone(), temp.path());

        let verdict = generator
            .generate_answer(
                "Capital of France?",
                &ConversationHistory::new(),
                "geo.md#0:Paris is the capital of France.",
            )
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Accepted("Paris.".to_string()));

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].max_tokens, Some(800));
        assert!(requests[0]
            .prompt
            .contains("geo.md#0:Paris is the capital of France."));
    }
}
