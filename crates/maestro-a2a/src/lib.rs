//! Agent-to-Agent (A2A) plumbing for Maestro.
//!
//! - [`protocol`]: agent card document, JSON-RPC envelope, message and task wire shapes.
//! - [`registry`]: the [`CapabilityRegistry`] mapping worker names to descriptors.
//! - [`client`]: the [`WorkerClient`] trait and its HTTP implementation.
//! - [`discovery`]: fetching agent cards from `/.well-known/agent.json`.

/// Worker client: send a message, fold the reply stream.
pub mod client;
/// Agent card discovery.
pub mod discovery;
/// A2A wire types and JSON-RPC envelope.
pub mod protocol;
/// Capability registry of named workers.
pub mod registry;

pub use client::{collect_final, HttpWorkerClient, WorkerClient, DEFAULT_TIMEOUT};
pub use discovery::{CardResolver, WorkerSource};
pub use protocol::{
    AgentCapabilities, AgentCard, AgentSkill, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    WorkerEvent,
};
pub use registry::{CapabilityRegistry, SkillDescriptor, WorkerDescriptor};
