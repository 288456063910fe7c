//! Askbot Core Library
//!
//! This crate provides the foundational utilities shared by every askbot crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ChatConfig};
pub use error::{AppError, AppResult};
