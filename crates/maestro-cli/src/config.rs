use maestro_a2a::WorkerSource;
use maestro_agent::{LlmProvider, ModelConfig};
use maestro_core::{MaestroError, MaestroResult};
use maestro_gateway::PostProcessStep;
use maestro_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct MaestroConfig {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default = "default_workers")]
    pub workers: Vec<WorkerEntry>,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

/// The completion model. The API key is read from `api_key_env`.
#[derive(Debug, Deserialize)]
pub struct ModelSection {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key_env: default_api_key_env(),
            api_base_url: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ModelSection {
    pub fn resolve(&self) -> MaestroResult<ModelConfig> {
        let api_key = std::env::var(&self.api_key_env).map_err(|_| {
            MaestroError::Config(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))
        })?;
        let mut config = ModelConfig::groq(api_key);
        config.provider = self.provider;
        config.model_id = self.model_id.clone();
        config.api_base_url = self.api_base_url.clone();
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(m) = self.max_tokens {
            config.max_tokens = m;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    Keyword,
    Model,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrchestratorSection {
    #[serde(flatten)]
    pub engine: OrchestratorConfig,
    #[serde(default)]
    pub classifier: ClassifierKind,
    /// Plan through this registered worker instead of calling the model.
    #[serde(default)]
    pub planner_worker: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Base URL other agents should use to reach a server on `port`.
    pub fn public_url(&self, port: u16) -> String {
        let host = if self.host == "0.0.0.0" {
            "localhost"
        } else {
            &self.host
        };
        format!("http://{host}:{port}/")
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerEntry {
    pub name: String,
    pub url: String,
    /// Fetch the agent card instead of trusting this entry alone.
    #[serde(default = "default_true")]
    pub discover: bool,
    #[serde(default)]
    pub streaming: bool,
}

impl WorkerEntry {
    pub fn source(&self) -> WorkerSource {
        WorkerSource::new(self.name.clone(), self.url.clone())
    }
}

/// A worker this process can host with `maestro worker <name>`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instruction: String,
    pub port: u16,
    #[serde(default)]
    pub post_process: Vec<PostProcessStep>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

fn default_provider() -> LlmProvider {
    LlmProvider::Groq
}
fn default_model_id() -> String {
    "llama3-8b-8192".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

fn default_workers() -> Vec<WorkerEntry> {
    [
        ("planner", "http://localhost:8001/"),
        ("greeting", "http://localhost:8002/"),
        ("sentiment", "http://localhost:8003/"),
    ]
    .into_iter()
    .map(|(name, url)| WorkerEntry {
        name: name.to_string(),
        url: url.to_string(),
        discover: true,
        streaming: false,
    })
    .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use maestro_orchestrator::{DispatchMode, FailurePolicy};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: MaestroConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.provider, LlmProvider::Groq);
        assert_eq!(config.model.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.orchestrator.engine.dispatch, DispatchMode::Sequential);
        assert_eq!(config.orchestrator.classifier, ClassifierKind::Keyword);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.client.timeout(), Duration::from_secs(60));
        let names: Vec<_> = config.workers.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["planner", "greeting", "sentiment"]);
    }

    #[test]
    fn test_full_config() {
        let config: MaestroConfig = toml::from_str(
            r#"
            [model]
            provider = "openrouter"
            model_id = "meta-llama/llama-3-8b-instruct"
            api_key_env = "OPENROUTER_API_KEY"

            [orchestrator]
            dispatch = "concurrent"
            failure_policy = "best_effort"
            greeting_worker = "hello"
            classifier = "model"
            planner_worker = "planner"

            [server]
            host = "127.0.0.1"
            port = 9000

            [[workers]]
            name = "pos_tagger"
            url = "http://localhost:8004/"
            discover = false
            streaming = true

            [[agents]]
            name = "expenses"
            instruction = "Track expenses. Return only JSON."
            port = 8010
            post_process = ["strip_fences", "timestamp"]
            tags = ["finance"]
            "#,
        )
        .unwrap();

        assert_eq!(config.model.provider, LlmProvider::OpenRouter);
        assert_eq!(config.orchestrator.engine.dispatch, DispatchMode::Concurrent);
        assert_eq!(config.orchestrator.engine.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(config.orchestrator.engine.greeting_worker, "hello");
        assert_eq!(config.orchestrator.classifier, ClassifierKind::Model);
        assert_eq!(config.orchestrator.planner_worker.as_deref(), Some("planner"));
        assert_eq!(config.server.public_url(9000), "http://127.0.0.1:9000/");
        assert_eq!(config.workers.len(), 1);
        assert!(!config.workers[0].discover);
        assert!(config.workers[0].streaming);
        assert_eq!(
            config.agents[0].post_process,
            vec![PostProcessStep::StripFences, PostProcessStep::Timestamp]
        );
        assert_eq!(config.agents[0].tags, vec!["finance"]);
    }

    #[test]
    fn test_public_url_for_wildcard_host() {
        assert_eq!(ServerConfig::default().public_url(8002), "http://localhost:8002/");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let section = ModelSection {
            api_key_env: "MAESTRO_TEST_UNSET_KEY_VAR".into(),
            ..ModelSection::default()
        };
        assert!(matches!(section.resolve(), Err(MaestroError::Config(_))));
    }
}
