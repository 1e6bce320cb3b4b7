//! End-to-end orchestration scenarios.
//!
//! Workers and the planning model are in-process fakes, so each scenario can
//! assert exactly which calls were made, in which order, and which task
//! events were published.

use async_trait::async_trait;
use maestro_a2a::{CapabilityRegistry, WorkerClient, WorkerDescriptor};
use maestro_agent::TextCompletion;
use maestro_core::{MaestroError, MaestroResult, Message, TaskEvent, TaskState};
use maestro_orchestrator::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    Reply(&'static str),
    ReplyAfter(&'static str, Duration),
    Fail,
}

/// Scripted workers keyed by name. Records every (worker, input) call.
#[derive(Default)]
struct FakeWorkers {
    behaviors: HashMap<&'static str, Behavior>,
    calls: Mutex<Vec<(String, String)>>,
    completions: Mutex<Vec<String>>,
}

impl FakeWorkers {
    fn with(mut self, name: &'static str, behavior: Behavior) -> Self {
        self.behaviors.insert(name, behavior);
        self
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl WorkerClient for FakeWorkers {
    async fn send(&self, worker: &WorkerDescriptor, message: Message) -> MaestroResult<Message> {
        self.calls.lock().push((worker.name.clone(), message.text()));
        let behavior = self
            .behaviors
            .get(worker.name.as_str())
            .cloned()
            .unwrap_or(Behavior::Fail);

        let reply = match behavior {
            Behavior::Reply(text) => text,
            Behavior::ReplyAfter(text, delay) => {
                tokio::time::sleep(delay).await;
                text
            }
            Behavior::Fail => {
                return Err(MaestroError::Transport(format!(
                    "connection refused: {}",
                    worker.address
                )))
            }
        };
        self.completions.lock().push(worker.name.clone());
        Ok(Message::agent(reply))
    }
}

/// Planning model returning one fixed output and counting calls.
struct FakePlanner {
    output: &'static str,
    calls: AtomicUsize,
}

impl FakePlanner {
    fn new(output: &'static str) -> Arc<Self> {
        Arc::new(Self {
            output,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextCompletion for FakePlanner {
    async fn complete(&self, _prompt: &str) -> MaestroResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.to_string())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    workers: Arc<FakeWorkers>,
    planner: Arc<FakePlanner>,
    events: mpsc::UnboundedReceiver<TaskEvent>,
}

fn harness(names: &[&str], workers: FakeWorkers, plan_output: &'static str) -> Harness {
    let registry = CapabilityRegistry::from_addresses(
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.to_string(), format!("http://localhost:{}/", 8001 + i))),
    )
    .unwrap();
    let workers = Arc::new(workers);
    let planner = FakePlanner::new(plan_output);
    let (tx, events) = mpsc::unbounded_channel();

    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        workers.clone(),
        Planner::new(planner.clone()),
        Arc::new(KeywordClassifier::default()),
    )
    .with_event_sink(tx);

    Harness {
        orchestrator,
        workers,
        planner,
        events,
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn states_by_task(events: &[TaskEvent]) -> HashMap<String, Vec<TaskState>> {
    let mut map: HashMap<String, Vec<TaskState>> = HashMap::new();
    for e in events {
        map.entry(e.task_id.clone()).or_default().push(e.state);
    }
    map
}

const TWO_STEP_PLAN: &str = r#"```json
[
  {"agent": "sentiment", "input": "I love this"},
  {"agent": "pos_tagger", "input": "I love this"}
]
```"#;

// ---------------------------------------------------------------------------
// Scenario A: greeting goes straight to the greeting worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_greeting_bypasses_planner() {
    let workers = FakeWorkers::default().with("greeting", Behavior::Reply("  Hello to you too!\n"));
    let mut h = harness(&["greeting", "planner", "sentiment"], workers, "[]");

    let report = h.orchestrator.run("Hello!").await.unwrap();

    // Raw reply, untrimmed.
    assert_eq!(report.text, "  Hello to you too!\n");
    assert!(report.plan.is_none());
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.workers.calls(),
        vec![("greeting".to_string(), "Hello!".to_string())]
    );

    let events = drain(&mut h.events);
    let states: Vec<_> = events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![TaskState::Submitted, TaskState::Working, TaskState::Completed]
    );
    assert!(events[2].is_final);
    assert_eq!(events[2].message.as_ref().unwrap().text(), "  Hello to you too!\n");
}

// ---------------------------------------------------------------------------
// Scenario B: two-step plan, replies joined in plan order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_two_step_plan_aggregates_in_order() {
    let workers = FakeWorkers::default()
        .with("sentiment", Behavior::Reply("positive"))
        .with("pos_tagger", Behavior::Reply("PRON VERB DET"));
    let mut h = harness(&["sentiment", "pos_tagger"], workers, TWO_STEP_PLAN);

    let text = h
        .orchestrator
        .handle("Check sentiment and POS tags for 'I love this'")
        .await
        .unwrap();

    assert_eq!(text, "positive PRON VERB DET");
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.workers.calls(),
        vec![
            ("sentiment".to_string(), "I love this".to_string()),
            ("pos_tagger".to_string(), "I love this".to_string()),
        ]
    );

    let events = drain(&mut h.events);
    let by_task = states_by_task(&events);
    assert_eq!(by_task.len(), 2);
    for states in by_task.values() {
        assert_eq!(
            states,
            &vec![TaskState::Submitted, TaskState::Working, TaskState::Completed]
        );
    }
    // All events of one run share a context id.
    assert!(events.iter().all(|e| e.context_id == events[0].context_id));
}

// ---------------------------------------------------------------------------
// Scenario C: plan names an unregistered worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_worker_in_plan_dispatches_nothing() {
    let workers = FakeWorkers::default().with("sentiment", Behavior::Reply("positive"));
    let mut h = harness(
        &["sentiment"],
        workers,
        r#"[{"agent": "sentiment", "input": "hola"}, {"agent": "translator", "input": "hola"}]"#,
    );

    let err = h.orchestrator.handle("Translate and rate 'hola'").await.unwrap_err();

    assert!(matches!(err, MaestroError::InvalidStep { index: 1, ref reason } if reason.contains("translator")));
    assert!(h.workers.calls().is_empty());
    assert!(drain(&mut h.events).is_empty(), "no task may be created");
}

#[tokio::test]
async fn test_malformed_plan_dispatches_nothing() {
    let mut h = harness(
        &["sentiment"],
        FakeWorkers::default(),
        "I think you should ask the sentiment agent.",
    );

    let err = h.orchestrator.handle("rate this").await.unwrap_err();
    assert!(matches!(err, MaestroError::MalformedPlan(_)));
    assert!(h.workers.calls().is_empty());
    assert!(drain(&mut h.events).is_empty());
}

// ---------------------------------------------------------------------------
// Scenario D: second step fails, run aborts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_second_step_failure_aborts_run() {
    let workers = FakeWorkers::default()
        .with("sentiment", Behavior::Reply("positive"))
        .with("pos_tagger", Behavior::Fail);
    let mut h = harness(&["sentiment", "pos_tagger"], workers, TWO_STEP_PLAN);

    let err = h.orchestrator.handle("Check both").await.unwrap_err();

    match &err {
        MaestroError::OrchestrationFailed { step, worker, source } => {
            assert_eq!(*step, 1);
            assert_eq!(worker, "pos_tagger");
            assert!(matches!(**source, MaestroError::Transport(_)));
        }
        other => panic!("expected OrchestrationFailed, got {other:?}"),
    }
    assert!(!err.to_string().contains("positive"));

    let events = drain(&mut h.events);
    let finals: Vec<_> = events.iter().filter(|e| e.is_final).collect();
    assert_eq!(finals.len(), 2);
    assert_eq!(finals[0].state, TaskState::Completed);
    assert_eq!(finals[1].state, TaskState::Failed);
    // The failure is recorded before the error is raised.
    assert!(finals[1].error.as_deref().unwrap().contains("connection refused"));
}

// ---------------------------------------------------------------------------
// Concurrent dispatch
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_concurrent_dispatch_keeps_plan_order() {
    let workers = FakeWorkers::default()
        .with("sentiment", Behavior::ReplyAfter("positive", Duration::from_millis(200)))
        .with("pos_tagger", Behavior::ReplyAfter("PRON VERB DET", Duration::from_millis(10)));
    let h = harness(&["sentiment", "pos_tagger"], workers, TWO_STEP_PLAN);
    let orchestrator = h.orchestrator.with_config(OrchestratorConfig {
        dispatch: DispatchMode::Concurrent,
        ..OrchestratorConfig::default()
    });

    let report = orchestrator.run("Check both").await.unwrap();

    // Step 2 finished first...
    assert_eq!(
        *h.workers.completions.lock(),
        vec!["pos_tagger".to_string(), "sentiment".to_string()]
    );
    // ...but output and task order follow the plan.
    assert_eq!(report.text, "positive PRON VERB DET");
    assert_eq!(report.tasks.len(), 2);
    assert_eq!(
        report.tasks[0].result.as_ref().unwrap().text(),
        "positive"
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_fail_fast_reports_first_failure_in_plan_order() {
    let workers = FakeWorkers::default()
        .with("sentiment", Behavior::Fail)
        .with("pos_tagger", Behavior::ReplyAfter("PRON", Duration::from_millis(50)));
    let mut h = harness(&["sentiment", "pos_tagger"], workers, TWO_STEP_PLAN);
    let orchestrator = h.orchestrator.with_config(OrchestratorConfig {
        dispatch: DispatchMode::Concurrent,
        ..OrchestratorConfig::default()
    });

    let err = orchestrator.run("Check both").await.unwrap_err();
    assert!(matches!(err, MaestroError::OrchestrationFailed { step: 0, .. }));

    // Every dispatched task still reached a terminal state.
    let by_task = states_by_task(&drain(&mut h.events));
    assert_eq!(by_task.len(), 2);
    assert!(by_task
        .values()
        .all(|states| states.last().is_some_and(|s| s.is_terminal())));
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_every_task_history_matches_its_events() {
    let workers = FakeWorkers::default()
        .with("sentiment", Behavior::Reply("positive"))
        .with("pos_tagger", Behavior::Reply("PRON"));
    let mut h = harness(&["sentiment", "pos_tagger"], workers, TWO_STEP_PLAN);

    let report = h.orchestrator.run("Check both").await.unwrap();
    let by_task = states_by_task(&drain(&mut h.events));

    for task in &report.tasks {
        assert_eq!(by_task[&task.id], task.states());
        assert!(task.is_terminal());
    }
}
