//! Interactive chat loop over stdin.

use super::setup::{build_manager, reply_for};
use super::DEFAULT_CONVERSATION;
use askbot_core::{config::AppConfig, AppResult};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Chat interactively (`/reset` clears the conversation, `/exit` quits)
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Conversation to continue
    #[arg(short = 'C', long, default_value = DEFAULT_CONVERSATION)]
    pub conversation: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Reset,
    Exit,
    Blank,
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Blank,
        "/exit" | "/quit" => Input::Exit,
        "/reset" => Input::Reset,
        question => Input::Question(question),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(conversation = %self.conversation, "Starting chat session");

        let manager = build_manager(config)?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            match classify(&line) {
                Input::Blank => continue,
                Input::Exit => break,
                Input::Reset => {
                    manager.reset(&self.conversation).await?;
                    println!("Conversation '{}' cleared", self.conversation);
                }
                Input::Question(question) => {
                    // Ctrl-C drops the in-flight turn; the stored history is untouched.
                    let cancel = CancellationToken::new();
                    let result = tokio::select! {
                        r = manager.handle_turn(&self.conversation, question, &cancel) => r,
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Turn cancelled");
                            continue;
                        }
                    };

                    match result {
                        Err(e) if e.is_cancelled() => continue,
                        other => {
                            if let Some(reply) = reply_for(other)? {
                                println!("{}", reply);
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("Chat session ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_input() {
        assert_eq!(classify("  "), Input::Blank);
        assert_eq!(classify("/exit\n"), Input::Exit);
        assert_eq!(classify("/reset"), Input::Reset);
        assert_eq!(classify(" what? "), Input::Question("what?"));
    }
}
