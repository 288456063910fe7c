//! Prompt system for askbot.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Built-in defaults for the rewrite and answer stages
//! - Workspace overrides under `.askbot/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use defaults::{ANSWER_PROMPT_ID, REWRITE_PROMPT_ID};
pub use loader::{list_prompts, load_prompt};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptInputSpec,
    PromptOutputSpec,
};
