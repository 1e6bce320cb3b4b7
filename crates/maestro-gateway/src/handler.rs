use async_trait::async_trait;
use maestro_agent::TextCompletion;
use maestro_core::{MaestroError, MaestroResult, Message};
use maestro_orchestrator::Orchestrator;
use std::sync::Arc;
use tracing::debug;

/// A capability served over A2A: one inbound message in, one reply out.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Answer one inbound message.
    async fn handle(&self, message: Message) -> MaestroResult<Message>;
}

/// A worker defined by a standing instruction to the completion model
/// (greeting, sentiment, part-of-speech tagging, planning, ...).
pub struct InstructedAgent {
    name: String,
    instruction: String,
    completion: Arc<dyn TextCompletion>,
}

impl InstructedAgent {
    /// An agent answering under `instruction`.
    pub fn new(
        name: impl Into<String>,
        instruction: impl Into<String>,
        completion: Arc<dyn TextCompletion>,
    ) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            completion,
        }
    }

    /// Agent name, used in errors.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl AgentHandler for InstructedAgent {
    async fn handle(&self, message: Message) -> MaestroResult<Message> {
        let input = message.text();
        if input.trim().is_empty() {
            return Err(MaestroError::Protocol(format!(
                "agent '{}' received a message without text",
                self.name
            )));
        }

        debug!(agent = %self.name, input_len = input.len(), "Running instructed agent");
        let reply = self
            .completion
            .complete_with_instruction(&self.instruction, &input)
            .await?;

        if reply.trim().is_empty() {
            return Err(MaestroError::EmptyResponse(self.name.clone()));
        }
        Ok(Message::agent(reply))
    }
}

/// Serves the orchestrator itself as an agent.
pub struct OrchestratorHandler {
    orchestrator: Arc<Orchestrator>,
}

impl OrchestratorHandler {
    /// Expose `orchestrator` as a handler.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl AgentHandler for OrchestratorHandler {
    async fn handle(&self, message: Message) -> MaestroResult<Message> {
        let text = self.orchestrator.handle(&message.text()).await?;
        Ok(Message::agent(text))
    }
}
