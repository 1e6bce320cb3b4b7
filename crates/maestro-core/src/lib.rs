//! Core types and error definitions for the Maestro orchestrator.
//!
//! This crate provides the foundational types shared across all Maestro crates:
//! the unified error enum, the wire-level [`Message`], the tracked [`Task`] and
//! the [`TaskLifecycle`] state machine that drives it.
//!
//! # Main types
//!
//! - [`MaestroError`]: Unified error enum for every orchestration failure kind.
//! - [`MaestroResult`]: Convenience alias for `Result<T, MaestroError>`.
//! - [`Message`]: A role-tagged sequence of text parts exchanged with workers.
//! - [`Task`]: The tracked unit of work for one plan step.
//! - [`TaskLifecycle`]: Owns one task and publishes its status events.

/// Task lifecycle state machine and event publication.
pub mod lifecycle;
/// Messages exchanged with workers.
pub mod message;
/// Task records, states and status events.
pub mod task;
/// Normalization of generative text output.
pub mod text;

pub use lifecycle::{EventSink, TaskLifecycle};
pub use message::{Message, Part, Role};
pub use task::{StatusEntry, Task, TaskEvent, TaskState};
pub use text::strip_code_fences;

// --- Error types ---

/// Top-level error type for Maestro.
///
/// Registry, planner, worker client and lifecycle failures each have their own
/// variant so callers can match on the kind instead of parsing messages.
#[derive(Debug, thiserror::Error)]
pub enum MaestroError {
    /// A worker with this name is already registered.
    #[error("Duplicate worker: {0}")]
    DuplicateWorker(String),

    /// No worker with this name is registered.
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    /// The planner output was not a JSON array.
    #[error("Malformed plan: {0}")]
    MalformedPlan(String),

    /// A plan element failed validation.
    #[error("Invalid plan step {index}: {reason}")]
    InvalidStep {
        /// Zero-based position of the offending element.
        index: usize,
        /// Why the element was rejected.
        reason: String,
    },

    /// Connection failure, timeout or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker answered with something other than the expected envelope.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The worker's response stream ended without a final message.
    #[error("Empty response from worker '{0}'")]
    EmptyResponse(String),

    /// A task transition outside the lifecycle graph was attempted.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// State the task was in.
        from: TaskState,
        /// State that was requested.
        to: TaskState,
    },

    /// A plan step failed and the run was aborted.
    #[error("Orchestration failed at step {step} (worker '{worker}'): {source}")]
    OrchestrationFailed {
        /// Zero-based plan position of the failed step.
        step: usize,
        /// Worker the step was dispatched to.
        worker: String,
        /// The first underlying failure.
        source: Box<MaestroError>,
    },

    /// The operation is not supported (e.g. cancellation).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The text-completion collaborator failed.
    #[error("Completion error: {0}")]
    Completion(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`MaestroError`].
pub type MaestroResult<T> = Result<T, MaestroError>;

impl MaestroError {
    /// Returns the innermost cause, unwrapping `OrchestrationFailed` layers.
    pub fn root_cause(&self) -> &MaestroError {
        match self {
            MaestroError::OrchestrationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
