use crate::config::{LlmProvider, ModelConfig};
use crate::llm::TextCompletion;
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult};
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, OpenRouter, Groq and any other provider that implements
/// the OpenAI chat completions API. No retries.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Builds the backend and its HTTP client.
    pub fn new(config: ModelConfig) -> MaestroResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MaestroError::Completion(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn build_messages(&self, system_prompt: Option<&str>, prompt: &str) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));
        messages
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request.header("X-Title", "Maestro")
        } else {
            request
        }
    }

    async fn chat(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(system_prompt, prompt),
        });

        debug!(model = %self.config.model_id, "Requesting chat completion");

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| MaestroError::Completion(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| MaestroError::Completion(e.to_string()))?;

        if !status.is_success() {
            return Err(MaestroError::Completion(format!(
                "chat completion API error {status}: {text}"
            )));
        }

        let resp_body: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| MaestroError::Completion(format!("invalid completion body: {e}")))?;
        parse_completion_response(&resp_body)
    }
}

#[async_trait]
impl TextCompletion for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> MaestroResult<String> {
        self.chat(None, prompt).await
    }

    async fn complete_with_instruction(
        &self,
        instruction: &str,
        prompt: &str,
    ) -> MaestroResult<String> {
        self.chat(Some(instruction), prompt).await
    }
}

/// Extract the first choice's text content.
pub fn parse_completion_response(body: &serde_json::Value) -> MaestroResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| MaestroError::Completion(format!("completion has no text content: {body}")))
}
