use crate::classifier::QueryClassifier;
use crate::plan::Plan;
use crate::planner::Planner;
use futures_util::future::join_all;
use maestro_a2a::{CapabilityRegistry, WorkerClient, WorkerDescriptor};
use maestro_core::{
    EventSink, MaestroError, MaestroResult, Message, Task, TaskEvent, TaskLifecycle,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How plan steps are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One step at a time, in plan order.
    #[default]
    Sequential,
    /// All steps at once. Output is still assembled in plan order.
    Concurrent,
}

/// What a failed step does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure aborts the run and no partial output is returned.
    #[default]
    FailFast,
    /// Aggregate whatever completed; fail only if nothing did.
    BestEffort,
}

/// Dispatch and failure behavior of an [`Orchestrator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How plan steps are dispatched.
    #[serde(default)]
    pub dispatch: DispatchMode,
    /// What a failed step does to the run.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Worker that answers greetings directly.
    #[serde(default = "default_greeting_worker")]
    pub greeting_worker: String,
}

fn default_greeting_worker() -> String {
    "greeting".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::default(),
            failure_policy: FailurePolicy::default(),
            greeting_worker: default_greeting_worker(),
        }
    }
}

/// Outcome of one orchestration run.
#[derive(Debug, Clone)]
pub struct OrchestrationReport {
    /// The aggregated reply (or the greeting worker's raw reply).
    pub text: String,
    /// The plan that was executed; `None` on the greeting path.
    pub plan: Option<Plan>,
    /// Every task of the run in plan order, each in a terminal state.
    pub tasks: Vec<Task>,
}

/// The control loop: classify the query, plan, dispatch one task per step and
/// aggregate the replies in plan order.
///
/// The registry is shared; tasks are owned by the run that created them.
pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    client: Arc<dyn WorkerClient>,
    planner: Planner,
    classifier: Arc<dyn QueryClassifier>,
    config: OrchestratorConfig,
    sinks: Vec<EventSink>,
}

impl Orchestrator {
    /// Orchestrator with the default configuration.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        client: Arc<dyn WorkerClient>,
        planner: Planner,
        classifier: Arc<dyn QueryClassifier>,
    ) -> Self {
        Self {
            registry,
            client,
            planner,
            classifier,
            config: OrchestratorConfig::default(),
            sinks: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish every task event of every run to `sink`.
    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Open a new event stream. It sees events of runs started after this call.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sinks.push(tx);
        rx
    }

    /// The registry steps are resolved against.
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Answer a query with one string.
    pub async fn handle(&self, query: &str) -> MaestroResult<String> {
        self.run(query).await.map(|report| report.text)
    }

    /// Answer a query and report the tasks that produced the answer.
    pub async fn run(&self, query: &str) -> MaestroResult<OrchestrationReport> {
        let context_id = Uuid::new_v4().to_string();
        info!(context_id = %context_id, "Orchestrator: received query");

        if self.classifier.is_greeting(query).await? {
            if self.registry.contains(&self.config.greeting_worker) {
                return self.greet(query, &context_id).await;
            }
            debug!(
                worker = %self.config.greeting_worker,
                "Greeting worker not registered, planning instead"
            );
        }

        let available = self.registry.list_names();
        let plan = self.planner.plan(query, &available).await?;
        self.execute(plan, &context_id).await
    }

    /// Tasks cannot be cancelled.
    pub fn cancel(&self, task_id: &str) -> MaestroResult<()> {
        Err(MaestroError::Unsupported(format!(
            "cancellation of task {task_id}"
        )))
    }

    /// Greeting path: one direct task, reply returned verbatim.
    async fn greet(&self, query: &str, context_id: &str) -> MaestroResult<OrchestrationReport> {
        let worker = self.registry.resolve(&self.config.greeting_worker)?;
        info!(worker = %worker.name, "Orchestrator: direct dispatch of greeting");

        let (task, result) = self.run_step(0, &worker, query, context_id).await;
        match result {
            Ok(reply) => Ok(OrchestrationReport {
                text: reply.text(),
                plan: None,
                tasks: vec![task],
            }),
            Err(source) => Err(MaestroError::OrchestrationFailed {
                step: 0,
                worker: worker.name.clone(),
                source: Box::new(source),
            }),
        }
    }

    /// Dispatch every step of a plan and aggregate in plan order.
    pub async fn execute(&self, plan: Plan, context_id: &str) -> MaestroResult<OrchestrationReport> {
        // Resolve before creating any task: the registry may have changed since
        // the plan was validated.
        let workers = plan
            .iter()
            .map(|step| self.registry.resolve(&step.worker))
            .collect::<MaestroResult<Vec<_>>>()?;

        info!(
            steps = plan.len(),
            dispatch = ?self.config.dispatch,
            policy = ?self.config.failure_policy,
            "Orchestrator: executing plan"
        );

        let outcomes = match self.config.dispatch {
            DispatchMode::Sequential => self.execute_sequential(&plan, &workers, context_id).await,
            DispatchMode::Concurrent => {
                join_all(
                    plan.iter()
                        .zip(&workers)
                        .enumerate()
                        .map(|(index, (step, worker))| {
                            self.run_step(index, worker, &step.input, context_id)
                        }),
                )
                .await
            }
        };

        self.aggregate(plan, &workers, outcomes)
    }

    async fn execute_sequential(
        &self,
        plan: &Plan,
        workers: &[Arc<WorkerDescriptor>],
        context_id: &str,
    ) -> Vec<(Task, MaestroResult<Message>)> {
        let mut outcomes = Vec::with_capacity(plan.len());
        for (index, (step, worker)) in plan.iter().zip(workers).enumerate() {
            let outcome = self.run_step(index, worker, &step.input, context_id).await;
            let failed = outcome.1.is_err();
            outcomes.push(outcome);
            if failed && self.config.failure_policy == FailurePolicy::FailFast {
                debug!(step = index, "Fail-fast: skipping remaining steps");
                break;
            }
        }
        outcomes
    }

    fn aggregate(
        &self,
        plan: Plan,
        workers: &[Arc<WorkerDescriptor>],
        outcomes: Vec<(Task, MaestroResult<Message>)>,
    ) -> MaestroResult<OrchestrationReport> {
        let mut tasks = Vec::with_capacity(outcomes.len());
        let mut texts = Vec::new();
        let mut first_failure = None;

        for (index, (task, result)) in outcomes.into_iter().enumerate() {
            tasks.push(task);
            match result {
                Ok(reply) => texts.push(reply.text()),
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some((index, e));
                    }
                }
            }
        }

        if let Some((step, source)) = first_failure {
            let abort = match self.config.failure_policy {
                FailurePolicy::FailFast => true,
                FailurePolicy::BestEffort => texts.is_empty(),
            };
            let worker = workers
                .get(step)
                .map(|w| w.name.clone())
                .unwrap_or_default();
            if abort {
                error!(step, worker = %worker, error = %source, "Orchestrator: run failed");
                return Err(MaestroError::OrchestrationFailed {
                    step,
                    worker,
                    source: Box::new(source),
                });
            }
            warn!(step, worker = %worker, error = %source, "Best effort: dropping failed step");
        }

        let text = join_replies(&texts);
        info!(tasks = tasks.len(), "Orchestrator: run complete");
        Ok(OrchestrationReport {
            text,
            plan: Some(plan),
            tasks,
        })
    }

    /// Run one step under its own task. Always returns the task, terminal.
    async fn run_step(
        &self,
        step: usize,
        worker: &WorkerDescriptor,
        input: &str,
        context_id: &str,
    ) -> (Task, MaestroResult<Message>) {
        let mut lifecycle = TaskLifecycle::submit(None, context_id, self.sinks.clone());
        let result = self.drive(&mut lifecycle, step, worker, input).await;
        (lifecycle.into_task(), result)
    }

    async fn drive(
        &self,
        lifecycle: &mut TaskLifecycle,
        step: usize,
        worker: &WorkerDescriptor,
        input: &str,
    ) -> MaestroResult<Message> {
        lifecycle.start()?;
        info!(task_id = %lifecycle.id(), step, worker = %worker.name, "Dispatching step");

        match self.client.send(worker, Message::user(input)).await {
            Ok(reply) => {
                lifecycle.succeed(reply.clone())?;
                info!(task_id = %lifecycle.id(), step, worker = %worker.name, "Step completed");
                Ok(reply)
            }
            Err(e) => {
                warn!(task_id = %lifecycle.id(), step, worker = %worker.name, error = %e, "Step failed");
                lifecycle.fail(e.to_string())?;
                Err(e)
            }
        }
    }
}

/// Trim each reply, drop empty ones, join with a single space.
fn join_replies(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
