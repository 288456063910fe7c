//! History command handler.

use super::DEFAULT_CONVERSATION;
use askbot_chat::{ConversationStore, FileConversationStore};
use askbot_core::{config::AppConfig, AppResult};
use clap::{Args, Subcommand};

/// Inspect or clear stored conversations
#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// Print a conversation's turns
    Show {
        #[arg(short = 'C', long, default_value = DEFAULT_CONVERSATION)]
        conversation: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget a conversation
    Clear {
        #[arg(short = 'C', long, default_value = DEFAULT_CONVERSATION)]
        conversation: String,
    },
    /// List stored conversations
    List,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = FileConversationStore::new(config.conversations_dir());

        match &self.action {
            HistoryAction::Show { conversation, json } => {
                let history = store.load(conversation).await?;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&history)?);
                } else if history.is_empty() {
                    println!("Conversation '{}' is empty", conversation);
                } else {
                    for turn in history.turns() {
                        println!("User: {}", turn.user);
                        println!("Bot:  {}", turn.assistant);
                        println!();
                    }
                }
            }
            HistoryAction::Clear { conversation } => {
                if store.clear(conversation).await? {
                    println!("Conversation '{}' cleared", conversation);
                } else {
                    println!("Conversation '{}' has no history", conversation);
                }
            }
            HistoryAction::List => {
                for id in store.list().await? {
                    println!("{}", id);
                }
            }
        }

        Ok(())
    }
}
