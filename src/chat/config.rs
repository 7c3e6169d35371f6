//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.  Anything not given on the command
//! line falls back to `OLLAMA_BASE_URL` and `OLLAMA_API_KEY`.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::catalog::DEFAULT_TTL;
use crate::chat::commands::parse_f32_in_range;
use crate::conversation::DEFAULT_SYSTEM_PROMPT;
use crate::error::{Error, Result};
use crate::transport::Endpoint;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Lowest accepted temperature.
pub const MIN_TEMPERATURE: f32 = 0.0;

/// Highest accepted temperature.
pub const MAX_TEMPERATURE: f32 = 1.5;

/// Command-line arguments for the ollamachat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Endpoint to talk to.
    #[arrrg(optional, "Endpoint: local, cloud, or a URL (default: $OLLAMA_BASE_URL or cloud)", "WHERE")]
    pub endpoint: Option<String>,

    /// Bearer credential.
    #[arrrg(optional, "API key for hosted endpoints (default: $OLLAMA_API_KEY)", "KEY")]
    pub api_key: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: first model the endpoint lists)", "MODEL")]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arrrg(optional, "Sampling temperature 0.0-1.5 (default: 0.2)", "TEMP")]
    pub temperature: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The service to talk to.
    pub endpoint: Endpoint,

    /// The model to use; `None` picks the first model the catalog lists.
    pub model: Option<String>,

    /// Sampling temperature.
    pub temperature: f32,

    /// System prompt that frames the conversation.
    pub system_prompt: String,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// How long a fetched model list stays fresh.
    pub catalog_ttl: Duration,

    /// Timeout for listing models.  `None` uses the client default.
    pub tags_timeout: Option<Duration>,

    /// Timeout for one chat generation.  `None` uses the client default.
    pub chat_timeout: Option<Duration>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Endpoint: from `OLLAMA_BASE_URL`/`OLLAMA_API_KEY`, else the hosted service
    /// - Model: first listed by the endpoint
    /// - Temperature: 0.2
    /// - Color: enabled
    /// - Catalog TTL: 120 seconds
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::from_env(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            use_color: true,
            catalog_ttl: DEFAULT_TTL,
            tags_timeout: None,
            chat_timeout: None,
        }
    }

    /// Sets the endpoint.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the model catalog time-to-live.
    pub fn with_catalog_ttl(mut self, ttl: Duration) -> Self {
        self.catalog_ttl = ttl;
        self
    }

    /// Sets the request timeouts.
    pub fn with_timeouts(
        mut self,
        tags_timeout: Option<Duration>,
        chat_timeout: Option<Duration>,
    ) -> Self {
        self.tags_timeout = tags_timeout;
        self.chat_timeout = chat_timeout;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new();
        if let Some(choice) = args.endpoint {
            // A preset or URL on the command line still picks up the key from the environment.
            let api_key = config.endpoint.api_key().map(String::from);
            config.endpoint = Endpoint::from_choice(&choice)?.with_api_key(api_key);
        }
        if let Some(api_key) = args.api_key {
            config.endpoint = config.endpoint.with_api_key(Some(api_key));
        }
        if let Some(temperature) = args.temperature {
            config.temperature =
                parse_f32_in_range(&temperature, MIN_TEMPERATURE, MAX_TEMPERATURE).map_err(
                    |err| Error::validation(format!("--temperature {err}"), Some("temperature".to_string())),
                )?;
        }
        config.model = args.model;
        if let Some(system) = args.system {
            config.system_prompt = system;
        }
        config.use_color = !args.no_color;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert!(config.model.is_none());
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(config.use_color);
        assert_eq!(config.catalog_ttl, DEFAULT_TTL);
        assert!(config.tags_timeout.is_none());
        assert!(config.chat_timeout.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert!(config.model.is_none());
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            endpoint: Some("local".to_string()),
            api_key: Some("sk-test".to_string()),
            model: Some("qwen2.5:7b".to_string()),
            temperature: Some("1.1".to_string()),
            system: Some("You are terse.".to_string()),
            no_color: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.endpoint.base_url(), "http://localhost:11434");
        assert_eq!(config.endpoint.api_key(), Some("sk-test"));
        assert_eq!(config.model.as_deref(), Some("qwen2.5:7b"));
        assert_eq!(config.temperature, 1.1);
        assert_eq!(config.system_prompt, "You are terse.");
        assert!(!config.use_color);
    }

    #[test]
    fn config_from_args_rejects_bad_values() {
        let args = ChatArgs {
            temperature: Some("2.0".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).unwrap_err().is_validation());

        let args = ChatArgs {
            endpoint: Some("gopher://old".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).is_err());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_endpoint(Endpoint::local())
            .with_model("llama3.1")
            .with_temperature(0.9)
            .with_system_prompt("Test prompt")
            .without_color()
            .with_catalog_ttl(Duration::from_secs(10))
            .with_timeouts(Some(Duration::from_secs(1)), Some(Duration::from_secs(2)));

        assert_eq!(config.endpoint, Endpoint::local());
        assert_eq!(config.model.as_deref(), Some("llama3.1"));
        assert_eq!(config.temperature, 0.9);
        assert_eq!(config.system_prompt, "Test prompt");
        assert!(!config.use_color);
        assert_eq!(config.catalog_ttl, Duration::from_secs(10));
        assert_eq!(config.tags_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.chat_timeout, Some(Duration::from_secs(2)));
    }
}
