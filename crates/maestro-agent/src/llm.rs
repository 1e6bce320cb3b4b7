use crate::backends::openai::OpenAiBackend;
use crate::config::{LlmProvider, ModelConfig};
use async_trait::async_trait;
use maestro_core::MaestroResult;

/// An opaque prompt-in, text-out collaborator.
///
/// Output is untrusted free text: callers validate whatever structure they
/// expect from it.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete `prompt` and return the model's text.
    async fn complete(&self, prompt: &str) -> MaestroResult<String>;

    /// Completion under a standing instruction. Backends with a separate
    /// system role override this; the default prepends the instruction.
    async fn complete_with_instruction(
        &self,
        instruction: &str,
        prompt: &str,
    ) -> MaestroResult<String> {
        self.complete(&format!("{instruction}\n\n{prompt}")).await
    }
}

/// Completion client that dispatches to the provider's backend.
pub struct LlmClient {
    backend: Box<dyn TextCompletion>,
}

impl LlmClient {
    /// Client for the provider named in `config`.
    pub fn new(config: ModelConfig) -> MaestroResult<Self> {
        let backend: Box<dyn TextCompletion> = match config.provider {
            LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
                Box::new(OpenAiBackend::new(config)?)
            }
        };
        Ok(Self { backend })
    }

    /// Create from a pre-built backend.
    pub fn from_backend(backend: Box<dyn TextCompletion>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TextCompletion for LlmClient {
    async fn complete(&self, prompt: &str) -> MaestroResult<String> {
        self.backend.complete(prompt).await
    }

    async fn complete_with_instruction(
        &self,
        instruction: &str,
        prompt: &str,
    ) -> MaestroResult<String> {
        self.backend.complete_with_instruction(instruction, prompt).await
    }
}
