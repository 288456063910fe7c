//! Configuration management for askbot.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.askbot/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with most state stored in `.askbot/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .askbot/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider ("openai" or "ollama")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Answer pipeline settings
    pub chat: ChatConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } => model,
            ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Answer pipeline settings (`chat:` section of config.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// Maximum tokenized size of the serialized conversation history
    pub history_token_budget: usize,

    /// Passages must score strictly above this to enter the reference context
    pub relevance_threshold: f32,

    /// Passages requested per retrieval attempt
    pub top_k: usize,

    /// Knowledge base the retriever searches
    pub knowledge_base: String,

    /// Tokenizer encoding used for history budgeting
    pub tokenizer: String,

    /// Sampling temperature for the rewrite stage
    pub rewrite_temperature: f32,

    /// Sampling temperature for the answer stage
    pub answer_temperature: f32,

    /// Maximum tokens generated for an answer
    pub max_answer_tokens: u32,

    /// Fixed message returned when a question is refused
    pub refusal_message: String,
}

pub const DEFAULT_REFUSAL_MESSAGE: &str =
    "Sorry, I cannot provide information on illegal and unethical questions!";

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_token_budget: 2500,
            relevance_threshold: 0.8,
            top_k: 5,
            knowledge_base: "default".to_string(),
            tokenizer: "cl100k_base".to_string(),
            rewrite_temperature: 0.0,
            answer_temperature: 0.3,
            max_answer_tokens: 800,
            refusal_message: DEFAULT_REFUSAL_MESSAGE.to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    chat: Option<ChatConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            llm: None,
            chat: ChatConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `ASKBOT_WORKSPACE`: Override workspace path
    /// - `ASKBOT_CONFIG`: Path to config file
    /// - `ASKBOT_PROVIDER`: LLM provider
    /// - `ASKBOT_MODEL`: Model identifier
    /// - `ASKBOT_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use askbot_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], but an explicit workspace or config file
    /// (from CLI flags) wins over the environment when locating the YAML file.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var_os("ASKBOT_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        if let Some(config_file) =
            config_file.or_else(|| std::env::var_os("ASKBOT_CONFIG").map(PathBuf::from))
        {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".askbot/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ASKBOT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ASKBOT_MODEL") {
            config.model = model;
        }

        if let Ok(key) = std::env::var("ASKBOT_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        if let Some(chat) = config_file.chat {
            result.chat = chat;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .askbot directory.
    pub fn askbot_dir(&self) -> PathBuf {
        self.workspace.join(".askbot")
    }

    /// Directory holding persisted conversation histories.
    pub fn conversations_dir(&self) -> PathBuf {
        self.askbot_dir().join("conversations")
    }

    /// Ensure the .askbot directory exists.
    pub fn ensure_askbot_dir(&self) -> AppResult<()> {
        let dir = self.askbot_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .askbot directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration block for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint configured for a provider, if any.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// Resolve API key from `ASKBOT_API_KEY` or the provider's configured env var.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider and the pipeline settings.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(
                "OpenAI provider requires an API key (ASKBOT_API_KEY or llm.providers.openai.apiKeyEnv)"
                    .to_string(),
            ));
        }

        if self.chat.history_token_budget == 0 {
            return Err(AppError::Config(
                "chat.historyTokenBudget must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.chat.relevance_threshold) {
            return Err(AppError::Config(format!(
                "chat.relevanceThreshold must be within [0, 1], got {}",
                self.chat.relevance_threshold
            )));
        }

        if self.chat.top_k == 0 {
            return Err(AppError::Config("chat.topK must be at least 1".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.chat.history_token_budget, 2500);
        assert_eq!(config.chat.relevance_threshold, 0.8);
        assert_eq!(config.chat.refusal_message, DEFAULT_REFUSAL_MESSAGE);
        assert!(!config.verbose);
    }

    #[test]
    fn test_askbot_dir() {
        let config = AppConfig::default();
        assert!(config.askbot_dir().ends_with(".askbot"));
        assert!(config.conversations_dir().ends_with(".askbot/conversations"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_chat_section() {
        let yaml = r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://gpu-box:11434
      model: qwen2.5
chat:
  historyTokenBudget: 1200
  knowledgeBase: handbook
logging:
  level: debug
  color: false
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.model, "qwen2.5");
        assert_eq!(merged.chat.history_token_budget, 1200);
        assert_eq!(merged.chat.knowledge_base, "handbook");
        // Unspecified chat keys keep their defaults
        assert_eq!(merged.chat.relevance_threshold, 0.8);
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
        assert!(merged.no_color);
        assert_eq!(
            merged.resolve_endpoint("ollama").as_deref(),
            Some("http://gpu-box:11434")
        );
    }

    #[test]
    fn test_load_from_explicit_workspace() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".askbot")).unwrap();
        std::fs::write(
            dir.path().join(".askbot/config.yaml"),
            "chat:\n  historyTokenBudget: 900\n  topK: 3\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.workspace, dir.path());
        assert_eq!(config.chat.history_token_budget, 900);
        assert_eq!(config.chat.top_k, 3);
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let missing = PathBuf::from("/definitely/not/a/workspace");
        assert!(AppConfig::load_from(Some(missing), None).is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = AppConfig::default();
        config.chat.relevance_threshold = 1.5;
        assert!(config.validate().is_err());

        config.chat.relevance_threshold = 0.8;
        config.chat.history_token_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_openai_requires_key() {
        let mut config = AppConfig::default();
        config.provider = "openai".to_string();
        config.api_key = None;
        assert!(config.validate().is_err());

        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }
}
