//! Lifecycle tests that exercise several tasks publishing to one shared sink.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use maestro_core::{Message, TaskEvent, TaskLifecycle, TaskState};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_shared_sink_preserves_per_task_order_across_threads() {
    let (tx, mut rx) = mpsc::unbounded_channel::<TaskEvent>();

    let mut handles = Vec::new();
    for i in 0..8 {
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let mut lc = TaskLifecycle::submit(Some(format!("task-{i}")), "ctx", vec![tx]);
            tokio::task::yield_now().await;
            lc.start().unwrap();
            tokio::task::yield_now().await;
            if i % 2 == 0 {
                lc.succeed(Message::agent(format!("reply {i}"))).unwrap();
            } else {
                lc.fail(format!("failure {i}")).unwrap();
            }
            lc.into_task()
        }));
    }
    drop(tx);

    let mut tasks = Vec::new();
    for h in handles {
        tasks.push(h.await.unwrap());
    }

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 8 * 3);

    for task in &tasks {
        let observed: Vec<TaskState> = events
            .iter()
            .filter(|e| e.task_id == task.id)
            .map(|e| e.state)
            .collect();
        assert_eq!(observed, task.states(), "events and history agree for {}", task.id);
        assert_eq!(observed[0], TaskState::Submitted);
        assert_eq!(observed[1], TaskState::Working);
        assert!(observed[2].is_terminal());
    }
}

#[test]
fn test_task_record_roundtrips_through_json() {
    let mut lc = TaskLifecycle::submit(None, "ctx-42", vec![]);
    lc.start().unwrap();
    lc.succeed(Message::agent("NOUN VERB")).unwrap();
    let task = lc.into_task();

    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["contextId"], "ctx-42");
    assert_eq!(json["state"], "completed");
    assert_eq!(json["history"].as_array().unwrap().len(), 3);
    assert_eq!(json["result"]["parts"][0]["text"], "NOUN VERB");
}
