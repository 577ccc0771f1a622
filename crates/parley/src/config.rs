//! Runtime configuration for the agent.
//!
//! [`AgentConfig`] covers transport and sampling knobs: which provider to
//! talk to, with which credentials, model, and limits. Conversation-behavior
//! thresholds (max input length, session timeout, fallback persona) live on
//! the [`PersonaCatalog`](crate::agent::persona::PersonaCatalog) instead,
//! since they are external configuration data rather than runtime wiring.
//!
//! Two construction patterns are supported:
//!
//! ```ignore
//! // Environment-driven (PARLEY_* / OPENAI_API_KEY):
//! let config = AgentConfig::from_env();
//!
//! // Builder methods for the common overrides:
//! let config = AgentConfig::default()
//!     .with_model("gpt-4o")
//!     .with_temperature(0.2)
//!     .with_retries(2);
//! ```

use std::path::PathBuf;

/// Configuration for a [`ChatAgent`](crate::agent::chat::ChatAgent).
///
/// `api_key == None` selects the deterministic mock backend at
/// `initialize()`; everything else configures the live OpenAI-compatible
/// client.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API key for the completion provider. `None` selects the mock backend.
    pub api_key: Option<String>,
    /// Chat-completions endpoint URL (OpenAI-compatible).
    pub base_url: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Request timeout in seconds for the provider call.
    pub request_timeout_secs: u64,
    /// Retries for transient provider failures. `0` means a single attempt.
    pub max_retries: u32,
    /// Optional persona catalog file loaded at startup.
    pub persona_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::DEFAULT_COMPLETIONS_URL.to_string(),
            model: crate::DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            request_timeout_secs: 60,
            max_retries: 0,
            persona_file: None,
        }
    }
}

impl AgentConfig {
    /// Build a config from the environment.
    ///
    /// Reads `PARLEY_API_KEY` (falling back to `OPENAI_API_KEY`),
    /// `PARLEY_BASE_URL`, `PARLEY_MODEL`, `PARLEY_TEMPERATURE`,
    /// `PARLEY_MAX_TOKENS`, `PARLEY_REQUEST_TIMEOUT_SECS`,
    /// `PARLEY_MAX_RETRIES`, and `PARLEY_PERSONA_FILE`. Unset or unparseable
    /// variables keep their defaults; a missing key is not an error — the
    /// agent runs on the mock backend.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.api_key = std::env::var("PARLEY_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        if let Ok(url) = std::env::var("PARLEY_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("PARLEY_MODEL") {
            config.model = model;
        }
        if let Some(t) = parse_env("PARLEY_TEMPERATURE") {
            config.temperature = t;
        }
        if let Some(n) = parse_env("PARLEY_MAX_TOKENS") {
            config.max_tokens = n;
        }
        if let Some(n) = parse_env("PARLEY_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = n;
        }
        if let Some(n) = parse_env("PARLEY_MAX_RETRIES") {
            config.max_retries = n;
        }
        if let Ok(path) = std::env::var("PARLEY_PERSONA_FILE") {
            config.persona_file = Some(PathBuf::from(path));
        }

        config
    }

    // ── Builder methods ───────────────────────────────────────────

    /// Set the API key. Pass `None` to force the mock backend.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Set the chat-completions endpoint URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum tokens per completion.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the provider request timeout in seconds.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Enable retries for transient provider failures. `0` (the default)
    /// keeps the single-attempt behavior.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the persona catalog file to load at startup.
    pub fn with_persona_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.persona_file = Some(path.into());
        self
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_mock_backend() {
        let config = AgentConfig::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, crate::DEFAULT_MODEL);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn builders_chain() {
        let config = AgentConfig::default()
            .with_api_key(Some("sk-test".into()))
            .with_model("gpt-4o")
            .with_temperature(0.2)
            .with_max_tokens(256)
            .with_retries(3);

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn blank_api_key_treated_as_absent() {
        let config = AgentConfig::default().with_api_key(Some("   ".into()));
        assert!(config.api_key.is_none());
    }
}
