//! The text-completion collaborator used by the planner, the model-assisted
//! classifier and instruction-driven workers.

/// Provider backends.
pub mod backends;
/// Model and provider configuration.
pub mod config;
/// The text-completion trait and its client.
pub mod llm;

pub use config::{LlmProvider, ModelConfig};
pub use llm::{LlmClient, TextCompletion};
