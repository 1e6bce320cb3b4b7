use crate::message::Message;
use crate::task::{StatusEntry, Task, TaskEvent, TaskState};
use crate::{MaestroError, MaestroResult};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

/// Sending half of a task event stream. Unbounded: publishing never blocks
/// and never drops an event.
pub type EventSink = mpsc::UnboundedSender<TaskEvent>;

/// Owns one [`Task`] and drives it through the lifecycle graph:
///
/// ```text
/// submitted --start--> working --succeed--> completed
///                        \--fail--> failed
/// ```
///
/// Every transition appends to the task history and publishes one
/// [`TaskEvent`] to each sink before returning, so subscribers observe states
/// in emission order with no gaps.
pub struct TaskLifecycle {
    task: Task,
    sinks: Vec<EventSink>,
}

impl TaskLifecycle {
    /// Create a new task and emit `submitted`.
    ///
    /// A `None` id generates a fresh one.
    pub fn submit(
        task_id: Option<String>,
        context_id: impl Into<String>,
        sinks: Vec<EventSink>,
    ) -> Self {
        let id = task_id.unwrap_or_else(Task::generate_id);
        let mut lifecycle = Self {
            task: Task::new(id, context_id),
            sinks,
        };
        lifecycle.record(TaskState::Submitted, None, None);
        lifecycle
    }

    /// Continue a task the caller already knows about.
    ///
    /// `submitted` was emitted when the task was first created, so it is not
    /// emitted again; the next event is `working`.
    pub fn resume(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        sinks: Vec<EventSink>,
    ) -> Self {
        Self {
            task: Task::new(task_id, context_id),
            sinks,
        }
    }

    /// Attach another observer. It receives every event published from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sinks.push(tx);
        rx
    }

    /// `submitted -> working`. Call before any dispatch I/O begins.
    pub fn start(&mut self) -> MaestroResult<()> {
        self.transition(TaskState::Working, None, None)
    }

    /// `working -> completed`, recording the worker's reply.
    pub fn succeed(&mut self, result: Message) -> MaestroResult<()> {
        self.transition(TaskState::Completed, Some(result), None)
    }

    /// `working -> failed`, recording the reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> MaestroResult<()> {
        self.transition(TaskState::Failed, None, Some(reason.into()))
    }

    /// Cancellation is not part of the lifecycle.
    pub fn cancel(&mut self) -> MaestroResult<()> {
        Err(MaestroError::Unsupported(format!(
            "cancellation of task {} is not supported",
            self.task.id
        )))
    }

    /// Task id.
    pub fn id(&self) -> &str {
        &self.task.id
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.task.state
    }

    /// The task record.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Release the task record. Terminal tasks are immutable from here on.
    pub fn into_task(self) -> Task {
        self.task
    }

    fn transition(
        &mut self,
        next: TaskState,
        result: Option<Message>,
        error: Option<String>,
    ) -> MaestroResult<()> {
        let from = self.task.state;
        if !from.can_transition_to(next) {
            return Err(MaestroError::InvalidTransition { from, to: next });
        }
        if let Some(ref message) = result {
            self.task.result = Some(message.clone());
        }
        if let Some(ref reason) = error {
            self.task.error = Some(reason.clone());
        }
        self.record(next, result, error);
        Ok(())
    }

    fn record(&mut self, state: TaskState, message: Option<Message>, error: Option<String>) {
        let timestamp = Utc::now();
        self.task.state = state;
        self.task.history.push(StatusEntry { state, timestamp });

        debug!(task_id = %self.task.id, state = %state, "Task transition");

        let event = TaskEvent {
            task_id: self.task.id.clone(),
            context_id: self.task.context_id.clone(),
            state,
            timestamp,
            is_final: state.is_terminal(),
            message,
            error,
        };
        // Observers that hung up are dropped.
        self.sinks.retain(|sink| sink.send(event.clone()).is_ok());
    }
}
