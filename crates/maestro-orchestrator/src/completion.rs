use async_trait::async_trait;
use maestro_a2a::{WorkerClient, WorkerDescriptor};
use maestro_agent::TextCompletion;
use maestro_core::{MaestroResult, Message};
use std::sync::Arc;

/// A remote worker used as a text-completion collaborator.
///
/// Lets the [`Planner`](crate::Planner) delegate to a planner agent instead
/// of calling a model directly.
pub struct WorkerCompletion {
    client: Arc<dyn WorkerClient>,
    worker: Arc<WorkerDescriptor>,
}

impl WorkerCompletion {
    /// Completions served by `worker`.
    pub fn new(client: Arc<dyn WorkerClient>, worker: Arc<WorkerDescriptor>) -> Self {
        Self { client, worker }
    }
}

#[async_trait]
impl TextCompletion for WorkerCompletion {
    async fn complete(&self, prompt: &str) -> MaestroResult<String> {
        let reply = self.client.send(&self.worker, Message::user(prompt)).await?;
        Ok(reply.text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_remote_planner_as_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": "1",
                "result": {
                    "kind": "message", "role": "agent", "messageId": "m",
                    "parts": [{"kind": "text", "text": "```json\n[]\n```"}]
                }
            })))
            .mount(&server)
            .await;

        let client = Arc::new(maestro_a2a::HttpWorkerClient::new(Duration::from_secs(5)).unwrap());
        let worker = Arc::new(WorkerDescriptor::new("planner", server.uri()));
        let completion = WorkerCompletion::new(client, worker);
        assert_eq!(completion.complete("plan this").await.unwrap(), "[]");
    }
}
