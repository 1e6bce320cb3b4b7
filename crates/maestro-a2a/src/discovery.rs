use crate::protocol::{AgentCard, AGENT_CARD_PATH};
use crate::registry::{CapabilityRegistry, WorkerDescriptor};
use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// A worker to discover: the name it will be routed under and its base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSource {
    /// Name the worker is registered under.
    pub name: String,
    /// Base URL the agent card is fetched from.
    pub url: String,
}

impl WorkerSource {
    /// Creates a source for `name` at `url`.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Fetches agent cards from `<base>/.well-known/agent.json`.
pub struct CardResolver {
    http: reqwest::Client,
}

impl CardResolver {
    /// Resolver with a per-request timeout.
    pub fn new(timeout: Duration) -> MaestroResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MaestroError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Fetch and parse the agent card published under `base_url`.
    pub async fn fetch(&self, base_url: &str) -> MaestroResult<AgentCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MaestroError::Transport(format!("failed to fetch {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MaestroError::Transport(format!(
                "agent card request to {url} returned HTTP {status}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| MaestroError::Transport(format!("failed to read {url}: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| MaestroError::Protocol(format!("invalid agent card at {url}: {e}")))
    }

    /// Resolve one source into a descriptor.
    ///
    /// The card's `url` is the JSON-RPC endpoint; when it is empty the source
    /// URL is used instead.
    pub async fn describe(&self, source: &WorkerSource) -> MaestroResult<WorkerDescriptor> {
        let mut card = self.fetch(&source.url).await?;
        if card.url.trim().is_empty() {
            card.url = source.url.clone();
        }
        Ok(WorkerDescriptor::from_card(source.name.clone(), &card))
    }

    /// Discover every source and register the results.
    ///
    /// A failing source does not stop the others; its error is returned
    /// alongside its name.
    pub async fn discover_into(
        &self,
        registry: &CapabilityRegistry,
        sources: &[WorkerSource],
    ) -> Vec<(String, MaestroError)> {
        let results =
            futures_util::future::join_all(sources.iter().map(|s| self.describe(s))).await;

        let mut failures = Vec::new();
        for (source, result) in sources.iter().zip(results) {
            let outcome = result.and_then(|descriptor| registry.register(descriptor));
            match outcome {
                Ok(()) => info!(worker = %source.name, url = %source.url, "Discovered worker"),
                Err(e) => {
                    warn!(worker = %source.name, url = %source.url, error = %e, "Worker discovery failed");
                    failures.push((source.name.clone(), e));
                }
            }
        }
        failures
    }
}
