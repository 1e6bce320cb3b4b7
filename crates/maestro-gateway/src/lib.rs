//! A2A server side: publish an agent card and answer JSON-RPC
//! `message/send`, `message/stream` and `tasks/cancel` for any
//! [`AgentHandler`].

/// Post-processing decorators for handler replies.
pub mod decorate;
/// Message handlers hosted by the server.
pub mod handler;
/// axum A2A server.
pub mod server;

pub use decorate::{decorate, AttachTimestamp, Decorated, PostProcessStep, PostProcessor, StripFences};
pub use handler::{AgentHandler, InstructedAgent, OrchestratorHandler};
pub use server::A2aServer;
