//! Query orchestration: classify, plan, dispatch to workers, aggregate.
//!
//! ```text
//! query ─► classifier ─► greeting? ─► greeting worker ─► raw reply
//!                  └──────► planner ─► Plan ─► one Task per step ─► joined replies
//! ```

/// Greeting detection.
pub mod classifier;
/// A worker used as a completion model.
pub mod completion;
/// Orchestration engine: dispatch and aggregation.
pub mod engine;
/// Plan values and validation of planner output.
pub mod plan;
/// Plan generation through the completion model.
pub mod planner;

pub use classifier::{KeywordClassifier, ModelClassifier, QueryClassifier};
pub use completion::WorkerCompletion;
pub use engine::{
    DispatchMode, FailurePolicy, OrchestrationReport, Orchestrator, OrchestratorConfig,
};
pub use plan::{parse_plan, Plan, PlanStep};
pub use planner::Planner;
