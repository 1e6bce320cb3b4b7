//! Post-processing decorators for agent handlers.
//!
//! `decorate(base, steps)` returns a handler that runs `base` and then each
//! step in order on the successful reply. Errors pass through untouched.

use crate::handler::AgentHandler;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use maestro_core::{strip_code_fences, MaestroResult, Message, Part};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One transformation of a successful reply.
pub trait PostProcessor: Send + Sync {
    /// Transform a successful reply.
    fn apply(&self, reply: Message) -> Message;
}

/// Appends a `timestamp: <RFC 3339 UTC>` part.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachTimestamp;

impl PostProcessor for AttachTimestamp {
    fn apply(&self, mut reply: Message) -> Message {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        reply.parts.push(Part::text(format!("timestamp: {now}")));
        reply
    }
}

/// Removes code fences around each part.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripFences;

impl PostProcessor for StripFences {
    fn apply(&self, reply: Message) -> Message {
        let parts = reply
            .parts
            .iter()
            .map(|p| Part::text(strip_code_fences(&p.text)))
            .collect();
        Message::new(reply.role, parts)
    }
}

/// Config names for the built-in steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessStep {
    /// Append a UTC timestamp part.
    Timestamp,
    /// Unwrap fenced parts.
    StripFences,
}

impl PostProcessStep {
    /// The processor implementing this step.
    pub fn processor(self) -> Arc<dyn PostProcessor> {
        match self {
            PostProcessStep::Timestamp => Arc::new(AttachTimestamp),
            PostProcessStep::StripFences => Arc::new(StripFences),
        }
    }
}

/// A handler wrapped with post-processing steps.
pub struct Decorated {
    inner: Arc<dyn AgentHandler>,
    steps: Vec<Arc<dyn PostProcessor>>,
}

/// Wrap `inner` so every successful reply passes through `steps` in order.
pub fn decorate(inner: Arc<dyn AgentHandler>, steps: Vec<Arc<dyn PostProcessor>>) -> Decorated {
    Decorated { inner, steps }
}

#[async_trait]
impl AgentHandler for Decorated {
    async fn handle(&self, message: Message) -> MaestroResult<Message> {
        let reply = self.inner.handle(message).await?;
        Ok(self.steps.iter().fold(reply, |acc, step| step.apply(acc)))
    }
}
