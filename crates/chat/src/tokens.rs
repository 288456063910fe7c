//! Token counting for history budgeting.

use askbot_core::{AppError, AppResult};
use std::sync::Arc;

/// Counts tokens the way the answer model's tokenizer does.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Encoding name, for logs.
    fn name(&self) -> &str;
}

/// BPE token counter backed by tiktoken-rs.
pub struct TiktokenCounter {
    encoding: String,
    bpe: tiktoken_rs::CoreBPE,
}

impl TiktokenCounter {
    /// Load a BPE encoding by name (`cl100k_base` or `o200k_base`).
    pub fn new(encoding: &str) -> AppResult<Self> {
        let bpe = match encoding {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            other => {
                return Err(AppError::Config(format!(
                    "Unknown tokenizer encoding: {}. Supported: cl100k_base, o200k_base",
                    other
                )))
            }
        }
        .map_err(|e| AppError::Config(format!("Failed to load {}: {}", encoding, e)))?;

        Ok(Self {
            encoding: encoding.to_string(),
            bpe,
        })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn name(&self) -> &str {
        &self.encoding
    }
}

/// Create the token counter configured under `chat.tokenizer`.
pub fn create_token_counter(encoding: &str) -> AppResult<Arc<dyn TokenCounter>> {
    Ok(Arc::new(TiktokenCounter::new(encoding)?))
}
