//! Ask command handler.
//!
//! Runs a single turn of a stored conversation.

use super::setup::{build_manager, cancel_on_ctrl_c, reply_for};
use super::DEFAULT_CONVERSATION;
use askbot_chat::AnswerOutcome;
use askbot_core::{config::AppConfig, AppError, AppResult};
use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Ask one question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Conversation the question belongs to
    #[arg(short = 'C', long, default_value = DEFAULT_CONVERSATION)]
    pub conversation: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(conversation = %self.conversation, "Executing ask command");

        let question = self.get_question()?;
        let manager = build_manager(config)?;

        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(&cancel);

        let result = manager
            .handle_turn(&self.conversation, &question, &cancel)
            .await;

        if self.json {
            let output = match &result {
                Ok(outcome) => serde_json::json!({
                    "conversation": self.conversation,
                    "status": status_of(outcome),
                    "acceptable": outcome.is_acceptable(),
                    "answer": outcome.text(),
                }),
                Err(e) if e.is_upstream() => serde_json::json!({
                    "conversation": self.conversation,
                    "status": "upstream_failure",
                    "acceptable": false,
                    "answer": null,
                }),
                Err(_) => serde_json::Value::Null,
            };
            if !output.is_null() {
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        match reply_for(result)? {
            Some(reply) if !self.json => println!("{}", reply),
            _ => {}
        }

        Ok(())
    }

    fn get_question(&self) -> AppResult<String> {
        let question = match (&self.question, &self.file) {
            (Some(q), _) => q.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => {
                return Err(AppError::Config("No question provided".to_string()));
            }
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::Config("Question is empty".to_string()));
        }
        Ok(question)
    }
}

fn status_of(outcome: &AnswerOutcome) -> &'static str {
    match outcome {
        AnswerOutcome::Answered(_) => "answered",
        AnswerOutcome::Refused(_) => "refused",
        AnswerOutcome::NoAnswer => "no_answer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(question: Option<&str>) -> AskCommand {
        AskCommand {
            question: question.map(str::to_string),
            file: None,
            conversation: DEFAULT_CONVERSATION.to_string(),
            json: false,
        }
    }

    #[test]
    fn test_question_is_trimmed() {
        assert_eq!(command(Some("  hi there \n")).get_question().unwrap(), "hi there");
    }

    #[test]
    fn test_missing_or_blank_question_is_an_error() {
        assert!(command(None).get_question().is_err());
        assert!(command(Some("   ")).get_question().is_err());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_of(&AnswerOutcome::Answered("x".into())), "answered");
        assert_eq!(status_of(&AnswerOutcome::NoAnswer), "no_answer");
    }
}
