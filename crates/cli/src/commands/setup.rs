//! Wiring from `AppConfig` to a ready `ConversationManager`.

use askbot_chat::{
    create_token_counter, AnswerOutcome, AnswerPipeline, ConversationManager,
    FileConversationStore, GenerationSettings, HistoryStore, LlmGenerator,
};
use askbot_core::config::{AppConfig, ProviderConfig};
use askbot_core::{AppError, AppResult};
use askbot_knowledge::IndexRetriever;
use askbot_llm::create_client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const RETRY_MESSAGE: &str = "Sorry, something went wrong while answering. Please try again.";

pub fn build_manager(config: &AppConfig) -> AppResult<ConversationManager> {
    config.validate()?;

    let timeout = match config.get_provider_config(&config.provider) {
        Some(ProviderConfig::Ollama { timeout, .. }) => *timeout,
        _ => None,
    };
    let endpoint = config.resolve_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);
    let client = create_client(
        &config.provider,
        endpoint.as_deref(),
        api_key.as_deref(),
        timeout,
    )?;

    let generator = LlmGenerator::new(
        client,
        config.model.clone(),
        &config.workspace,
        GenerationSettings::from(&config.chat),
    )?;
    let retriever = IndexRetriever::open(
        &config.workspace,
        &config.chat.knowledge_base,
        config.chat.top_k,
    )?;
    let history_store = HistoryStore::new(
        create_token_counter(&config.chat.tokenizer)?,
        config.chat.history_token_budget,
    )?;

    let pipeline = AnswerPipeline::new(
        Arc::new(generator),
        Arc::new(retriever),
        history_store,
        config.chat.relevance_threshold,
    )
    .with_refusal_message(config.chat.refusal_message.clone());

    let store = FileConversationStore::new(config.conversations_dir());
    Ok(ConversationManager::new(pipeline, Arc::new(store)))
}

/// Cancel `token` when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling current turn");
            token.cancel();
        }
    });
}

/// What a turn shows the user, or the error that should end the command.
///
/// Upstream failures become a retry message instead of an error.
pub fn reply_for(result: AppResult<AnswerOutcome>) -> AppResult<Option<String>> {
    match result {
        Ok(AnswerOutcome::NoAnswer) => Ok(None),
        Ok(outcome) => Ok(outcome.text().map(str::to_string)),
        Err(AppError::Upstream { stage, message }) => {
            tracing::warn!(%stage, %message, "Answer pipeline failed upstream");
            Ok(Some(RETRY_MESSAGE.to_string()))
        }
        Err(e) => Err(e),
    }
}
