// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gitfix_core::FakeClock;
use gitfix_store::MemoryStore;

#[tokio::test]
async fn drain_collects_ids_and_publishes_lines() {
    let clock = FakeClock::new();
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new(clock));
    let task_id = TaskId::new("acme-widget-42-claude-sonnet-4");

    let mut log_sub = store.subscribe(&keys::task_log_channel(&task_id)).await.unwrap();
    let mut diff_sub = store.subscribe(&keys::task_diff_channel(&task_id)).await.unwrap();

    let (tx, rx) = mpsc::channel(16);
    let handle = drain_agent_events(
        store.clone(),
        task_id.clone(),
        CorrelationId::from_string("corr-1"),
        rx,
    );

    tx.send(AgentEvent::SessionStarted { session_id: "s-1".to_string() }).await.unwrap();
    tx.send(AgentEvent::ContainerStarted {
        container_id: "c-1".to_string(),
        container_name: "gitfix-42".to_string(),
    })
    .await
    .unwrap();
    tx.send(AgentEvent::OutputChunk { line: "building...".to_string() }).await.unwrap();
    tx.send(AgentEvent::DiffChunk { diff: "+ fixed".to_string() }).await.unwrap();
    drop(tx);

    let ids = handle.await.unwrap();
    assert_eq!(ids.session_id.as_deref(), Some("s-1"));
    assert_eq!(ids.container_id.as_deref(), Some("c-1"));
    assert_eq!(ids.container_name.as_deref(), Some("gitfix-42"));

    assert_eq!(log_sub.recv().await.unwrap(), b"building...".to_vec());
    assert_eq!(diff_sub.recv().await.unwrap(), b"+ fixed".to_vec());

    // Session locator persisted for the dashboard.
    let locator = store.get(&keys::session_log("s-1")).await.unwrap().unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&locator).unwrap();
    assert_eq!(parsed["taskId"], "acme-widget-42-claude-sonnet-4");
}
