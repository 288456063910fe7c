//! Knowledge command handler.
//!
//! Manages the knowledge bases the answer pipeline retrieves from.

use askbot_core::{config::AppConfig, AppResult};
use askbot_knowledge::{LearnOptions, QueryLanguage};
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Learn from local files and directories
    Learn(KnowledgeLearnCommand),
    /// Search the knowledge base
    Search(KnowledgeSearchCommand),
    /// Clean up knowledge base
    Clean(KnowledgeCleanCommand),
    /// Show knowledge base statistics
    Stats(KnowledgeStatsCommand),
}

/// Learn from sources
#[derive(Args, Debug)]
pub struct KnowledgeLearnCommand {
    /// Knowledge base name
    pub base: String,

    /// Paths to learn from
    #[arg(long, required = true)]
    pub path: Vec<PathBuf>,

    /// Only learn paths containing one of these patterns
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing one of these patterns
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Reset base before learning
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeLearnCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge learn command for base '{}'", self.base);

        let options = LearnOptions {
            base_name: self.base.clone(),
            paths: self.path.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            reset: self.reset,
        };

        let stats = askbot_knowledge::learn(&config.workspace, options).await?;

        if self.json {
            let output = serde_json::json!({
                "base": self.base,
                "sourcesCount": stats.sources_count,
                "skippedCount": stats.skipped_count,
                "chunksCount": stats.chunks_count,
                "bytesProcessed": stats.bytes_processed,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Learned {} sources ({} chunks, {} bytes, {} skipped) in {:.2}s",
                stats.sources_count,
                stats.chunks_count,
                stats.bytes_processed,
                stats.skipped_count,
                stats.duration_secs
            );
        }

        Ok(())
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LanguageArg {
    En,
    Zh,
}

impl From<LanguageArg> for QueryLanguage {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::En => QueryLanguage::English,
            LanguageArg::Zh => QueryLanguage::Chinese,
        }
    }
}

/// Search knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeSearchCommand {
    /// Knowledge base name
    pub base: String,

    /// Query text
    pub query: String,

    /// Language the query is written in
    #[arg(long, value_enum, default_value = "en")]
    pub language: LanguageArg,

    /// Number of passages to retrieve
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeSearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge search command for base '{}'", self.base);

        let passages = askbot_knowledge::search(
            &config.workspace,
            &self.base,
            &self.query,
            self.language.into(),
            self.top_k,
        )
        .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&passages)?);
        } else if passages.is_empty() {
            println!("No passages found");
        } else {
            let threshold = config.chat.relevance_threshold;
            for passage in &passages {
                let marker = if passage.score > threshold { "*" } else { " " };
                println!("{} {:.3}  {}", marker, passage.score, passage.source_id);
                println!("    {}", passage.content.replace('\n', " "));
            }
        }

        Ok(())
    }
}

/// Clean knowledge base
#[derive(Args, Debug)]
pub struct KnowledgeCleanCommand {
    /// Knowledge base name
    pub base: String,
}

impl KnowledgeCleanCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge clean command for base '{}'", self.base);

        askbot_knowledge::clean(&config.workspace, &self.base)?;

        println!("Knowledge base '{}' cleaned", self.base);

        Ok(())
    }
}

/// Show knowledge base stats
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Knowledge base name
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge stats command for base '{}'", self.base);

        let stats = askbot_knowledge::stats(&config.workspace, &self.base)?;

        if self.json {
            let output = serde_json::json!({
                "base": stats.base_name,
                "sourcesCount": stats.sources_count,
                "chunksCount": stats.chunks_count,
                "dbSizeBytes": stats.db_size_bytes,
                "lastLearnAt": stats.last_learn_at,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last_learn) = stats.last_learn_at {
                println!("  Last learn: {}", last_learn);
            }
        }

        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Learn(cmd) => cmd.execute(config).await,
            KnowledgeAction::Search(cmd) => cmd.execute(config).await,
            KnowledgeAction::Clean(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}
