use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported OpenAI-compatible providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI's hosted API.
    OpenAi,
    /// OpenRouter's model gateway.
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible API.
    Groq,
}

/// Configuration for the completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which provider to call.
    pub provider: LlmProvider,
    /// Model identifier, e.g. `llama3-8b-8192`.
    pub model_id: String,
    /// API key sent as a bearer token.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    60
}

impl ModelConfig {
    /// Groq-hosted `llama3-8b-8192`, the default model for planning.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Groq,
            model_id: "llama3-8b-8192".to_string(),
            api_key: api_key.into(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Base URL without the `/v1/...` path.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_defaults() {
        let mut config = ModelConfig::groq("k");
        assert_eq!(config.base_url(), "https://api.groq.com/openai");
        config.provider = LlmProvider::OpenRouter;
        assert_eq!(config.base_url(), "https://openrouter.ai/api");
        config.api_base_url = Some("http://localhost:9000".into());
        assert_eq!(config.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_parse_from_toml_with_defaults() {
        let config: ModelConfig = toml::from_str(
            r#"
            provider = "openai"
            model_id = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert!(config.api_key.is_empty());
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }
}
