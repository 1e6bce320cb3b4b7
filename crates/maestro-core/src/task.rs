use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a [`Task`].
///
/// The only legal moves are `submitted -> working` and
/// `working -> {completed | failed}`. There is no `canceled` state because
/// cancellation is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, not yet dispatched.
    Submitted,
    /// Dispatched and awaiting a reply.
    Working,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TaskState {
    /// True for `completed` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Whether the transition graph has an edge from `self` to `next`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Submitted, TaskState::Working)
                | (TaskState::Working, TaskState::Completed)
                | (TaskState::Working, TaskState::Failed)
        )
    }

    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a task's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// State entered.
    pub state: TaskState,
    /// When it was entered.
    pub timestamp: DateTime<Utc>,
}

/// The tracked unit of work for one plan step or one direct dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque task id.
    pub id: String,
    /// Correlates the tasks of one orchestration run.
    pub context_id: String,
    /// Current state.
    pub state: TaskState,
    /// Every state entered, oldest first.
    pub history: Vec<StatusEntry>,
    /// The worker's reply, set on `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Message>,
    /// Failure reason, set when the task reaches `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    /// A fresh task in `submitted` with an empty history.
    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            state: TaskState::Submitted,
            history: Vec::new(),
            result: None,
            error: None,
        }
    }

    /// Generates an opaque task identifier.
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// True once `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// States recorded in history, oldest first.
    pub fn states(&self) -> Vec<TaskState> {
        self.history.iter().map(|e| e.state).collect()
    }
}

/// A status change published on a task's event stream.
///
/// Serializes in the shape of an A2A `status-update` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Task that changed state.
    pub task_id: String,
    /// Conversation the task belongs to.
    pub context_id: String,
    /// New state.
    pub state: TaskState,
    /// When the state was entered.
    pub timestamp: DateTime<Utc>,
    /// Set on the terminal event.
    #[serde(rename = "final")]
    pub is_final: bool,
    /// Reply carried by the `completed` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Reason carried by the `failed` event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
